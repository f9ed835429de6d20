//! Token 预算控制
//!
//! 为对话历史设置轮数与 token 上限：从最新轮次向前累加，超出预算时丢弃最旧的部分。

/// Token 估算器（简单的字符计数近似）
pub struct TokenEstimator;

impl TokenEstimator {
    /// 估算文本的 token 数量
    /// 使用简单的启发式规则：英文约 4 字符/token，中文约 1.5 字符/token
    pub fn estimate(text: &str) -> usize {
        let mut ascii_chars = 0;
        let mut non_ascii_chars = 0;

        for c in text.chars() {
            if c.is_ascii() {
                ascii_chars += 1;
            } else {
                non_ascii_chars += 1;
            }
        }

        let tokens = ascii_chars / 4 + (non_ascii_chars as f64 / 1.5).ceil() as usize;
        tokens.max(1)
    }
}

/// 历史窗口预算：最多保留 max_turns 轮，且估算 token 总数不超过 max_tokens
#[derive(Debug, Clone, Copy)]
pub struct HistoryBudget {
    pub max_turns: usize,
    pub max_tokens: usize,
}

impl HistoryBudget {
    pub fn new(max_turns: usize, max_tokens: usize) -> Self {
        Self {
            max_turns,
            max_tokens,
        }
    }

    /// 返回满足预算的最新后缀。cost 给出每项的 token 估算；
    /// 最新一项即使单独超出 token 预算也会保留（否则模型看不到当前输入）。
    pub fn select_suffix<'a, T>(&self, items: &'a [T], cost: impl Fn(&T) -> usize) -> &'a [T] {
        let mut used = 0usize;
        let mut kept = 0usize;
        for item in items.iter().rev() {
            if kept >= self.max_turns {
                break;
            }
            let c = cost(item);
            if kept > 0 && used + c > self.max_tokens {
                break;
            }
            used += c;
            kept += 1;
        }
        &items[items.len() - kept..]
    }
}

impl Default for HistoryBudget {
    fn default() -> Self {
        Self::new(40, 6000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_estimator_english() {
        let text = "Hello, world! This is a test.";
        let tokens = TokenEstimator::estimate(text);
        assert!(tokens > 0);
        assert!(tokens < text.len());
    }

    #[test]
    fn test_token_estimator_empty() {
        assert_eq!(TokenEstimator::estimate(""), 1);
    }

    #[test]
    fn test_select_suffix_turn_cap() {
        let items = vec![1, 2, 3, 4, 5];
        let budget = HistoryBudget::new(3, usize::MAX);
        assert_eq!(budget.select_suffix(&items, |_| 1), &[3, 4, 5]);
    }

    #[test]
    fn test_select_suffix_token_cap_drops_oldest() {
        let items = vec![10, 10, 10, 10];
        let budget = HistoryBudget::new(100, 25);
        assert_eq!(budget.select_suffix(&items, |c| *c), &[10, 10]);
    }

    #[test]
    fn test_select_suffix_keeps_latest_even_if_oversized() {
        let items = vec![1, 500];
        let budget = HistoryBudget::new(10, 100);
        assert_eq!(budget.select_suffix(&items, |c| *c), &[500]);
    }

    #[test]
    fn test_select_suffix_zero_turns() {
        let items = vec![1, 2];
        let budget = HistoryBudget::new(0, 100);
        assert!(budget.select_suffix(&items, |c| *c).is_empty());
    }
}

use std::collections::BTreeMap;

/// Какие символы уже прислали хотя бы одну котировку.
///
/// Набор фиксируется при создании. Отметка переходит только false -> true,
/// символы вне набора игнорируются (сервер может прислать лишнее из-за батчинга).
#[derive(Debug, Clone, Default)]
pub struct SubscriptionTracker {
    received: BTreeMap<String, bool>,
}

impl SubscriptionTracker {
    /// Создаёт трекер по списку символов (дубликаты схлопываются)
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            received: symbols.into_iter().map(|s| (s.into(), false)).collect(),
        }
    }

    /// Отмечает символ. Возвращает `true`, только если это первая отметка.
    pub fn mark_received(&mut self, symbol: &str) -> bool {
        match self.received.get_mut(symbol) {
            Some(seen) if !*seen => {
                *seen = true;
                true
            }
            _ => false,
        }
    }

    /// Все символы отмечены. Пустой набор считается завершённым.
    pub fn is_complete(&self) -> bool {
        self.received.values().all(|seen| *seen)
    }

    /// Все отслеживаемые символы (отсортированы)
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.received.keys().map(String::as_str)
    }

    /// Символы, по которым данных ещё не было
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.received
            .iter()
            .filter(|(_, seen)| !**seen)
            .map(|(s, _)| s.as_str())
    }

    /// Сколько символов уже отмечено
    pub fn received_count(&self) -> usize {
        self.received.values().filter(|seen| **seen).count()
    }

    /// Размер набора
    pub fn len(&self) -> usize {
        self.received.len()
    }

    /// Набор пуст
    pub fn is_empty(&self) -> bool {
        self.received.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_until_every_symbol_marked() {
        let mut t = SubscriptionTracker::new(["AAPL", "MSFT"]);
        assert!(!t.is_complete());

        assert!(t.mark_received("AAPL"));
        assert!(!t.is_complete());
        assert_eq!(t.pending().collect::<Vec<_>>(), vec!["MSFT"]);

        assert!(t.mark_received("MSFT"));
        assert!(t.is_complete());
    }

    #[test]
    fn repeated_marks_are_noops_and_stay_complete() {
        let mut t = SubscriptionTracker::new(["AAPL"]);
        assert!(t.mark_received("AAPL"));
        assert!(!t.mark_received("AAPL"));
        assert!(!t.mark_received("AAPL"));
        assert!(t.is_complete());
        assert_eq!(t.received_count(), 1);
    }

    #[test]
    fn unknown_symbols_are_ignored() {
        let mut t = SubscriptionTracker::new(["AAPL"]);
        assert!(!t.mark_received("TSLA"));
        assert!(!t.is_complete());
        assert_eq!(t.len(), 1);
        assert_eq!(t.received_count(), 0);
    }

    #[test]
    fn empty_set_is_trivially_complete() {
        let t = SubscriptionTracker::new(Vec::<String>::new());
        assert!(t.is_empty());
        assert!(t.is_complete());
    }

    #[test]
    fn duplicates_collapse_and_symbols_are_sorted() {
        let t = SubscriptionTracker::new(["SPY", "/6EZ24:XCME", "SPY"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.symbols().collect::<Vec<_>>(), vec!["/6EZ24:XCME", "SPY"]);
    }

    #[test]
    fn symbols_are_case_sensitive() {
        let mut t = SubscriptionTracker::new(["SPY{=5m}"]);
        assert!(!t.mark_received("SPY{=5M}"));
        assert!(t.mark_received("SPY{=5m}"));
    }
}

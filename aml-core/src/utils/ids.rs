//! Identifier generation.

/// A fresh processing id: `proc_` followed by a random UUID.
pub fn new_processing_id() -> String {
    format!("proc_{}", uuid::Uuid::new_v4())
}

/// A fresh job event id: `evt_` followed by a random UUID.
pub fn new_event_id() -> String {
    format!("evt_{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_and_uniqueness() {
        let a = new_processing_id();
        let b = new_processing_id();
        assert!(a.starts_with("proc_"));
        assert_ne!(a, b);
        assert!(new_event_id().starts_with("evt_"));
    }
}

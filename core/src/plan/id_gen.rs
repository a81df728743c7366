use chrono::Local;
use uuid::Uuid;

/// Format: plan-{YYYYMMDDHHmmss}-{random8}
pub fn generate_plan_id() -> String {
    let ts = Local::now().format("%Y%m%d%H%M%S");
    let uuid = Uuid::new_v4().simple().to_string();
    let suffix = &uuid[..8];
    format!("plan-{}-{}", ts, suffix)
}

/// Id for a step the model emitted without one (1-based position).
pub fn positional_step_id(index: usize) -> String {
    format!("step-{}", index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::collections::HashSet;

    #[test]
    fn test_generate_plan_id_format() {
        let id = generate_plan_id();
        let re = Regex::new(r"^plan-\d{14}-[a-f0-9]{8}$").unwrap();
        assert!(re.is_match(&id), "Generated ID: {}", id);
    }

    #[test]
    fn test_generate_plan_id_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..200 {
            let id = generate_plan_id();
            assert!(ids.insert(id.clone()), "Duplicate ID: {}", id);
        }
    }

    #[test]
    fn test_positional_step_id() {
        assert_eq!(positional_step_id(0), "step-1");
        assert_eq!(positional_step_id(9), "step-10");
    }
}

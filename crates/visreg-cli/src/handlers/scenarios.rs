//! Scenarios command handler

use visreg::Scenario;

/// One line per scenario with its custom data fields
#[must_use]
pub fn render_scenarios() -> Vec<String> {
    Scenario::ALL
        .iter()
        .map(|scenario| {
            let fields = scenario.custom_fields();
            if fields.is_empty() {
                format!("{scenario}")
            } else {
                format!("{scenario}: {}", fields.join(", "))
            }
        })
        .collect()
}

/// Execute the scenarios command
pub fn execute_scenarios() {
    for line in render_scenarios() {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_scenario_listed() {
        let lines = render_scenarios();
        assert_eq!(lines.len(), Scenario::ALL.len());
        assert_eq!(lines[1], "login: username, password");
        assert_eq!(lines[5], "visual_test");
        assert!(lines[0].starts_with("register: customer.firstName"));
    }
}

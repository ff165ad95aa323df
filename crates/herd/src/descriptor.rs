// ABOUTME: Expands worker groups into one descriptor per concrete replica.
// ABOUTME: Instance names are "<group>_<1-based index>" and drive every log prefix.

use herd_core::WorkerGroupSpec;

/// One worker instance to launch. Pure data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerDescriptor {
    pub group: String,
    /// 1-based replica index within the group.
    pub index: u32,
    pub instance_name: String,
    pub command: Vec<String>,
}

impl WorkerDescriptor {
    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.command.get(1..).unwrap_or_default()
    }
}

pub fn instance_name(group: &str, index: u32) -> String {
    format!("{group}_{index}")
}

/// Groups in declaration order, replicas in index order.
pub fn expand_descriptors(groups: &[WorkerGroupSpec]) -> Vec<WorkerDescriptor> {
    groups
        .iter()
        .flat_map(|group| {
            (1..=group.replicas).map(move |index| WorkerDescriptor {
                group: group.name.clone(),
                index,
                instance_name: instance_name(&group.name, index),
                command: group.command.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expands_replicas_in_order() {
        let groups = vec![
            WorkerGroupSpec::new("A", 2, &["worker", "--fast"]),
            WorkerGroupSpec::new("B", 1, &["other"]),
        ];

        let descriptors = expand_descriptors(&groups);
        let names: Vec<_> = descriptors
            .iter()
            .map(|d| d.instance_name.as_str())
            .collect();
        assert_eq!(names, vec!["A_1", "A_2", "B_1"]);

        assert_eq!(descriptors[0].command, vec!["worker", "--fast"]);
        assert_eq!(descriptors[1].command, vec!["worker", "--fast"]);
        assert_eq!(descriptors[2].command, vec!["other"]);
        assert_eq!(descriptors[1].group, "A");
        assert_eq!(descriptors[1].index, 2);
    }

    #[test]
    fn test_total_matches_replica_sum() {
        let groups = vec![
            WorkerGroupSpec::new("web", 4, &["serve"]),
            WorkerGroupSpec::new("queue", 3, &["consume"]),
            WorkerGroupSpec::new("cron", 1, &["tick"]),
        ];
        assert_eq!(expand_descriptors(&groups).len(), 8);
    }

    #[test]
    fn test_program_and_args() {
        let groups = vec![WorkerGroupSpec::new("py", 1, &["python", "-u", "app.py"])];
        let descriptor = &expand_descriptors(&groups)[0];
        assert_eq!(descriptor.program(), "python");
        assert_eq!(descriptor.args(), &["-u".to_string(), "app.py".to_string()]);
    }

    #[test]
    fn test_double_digit_index() {
        let groups = vec![WorkerGroupSpec::new("w", 12, &["x"])];
        let descriptors = expand_descriptors(&groups);
        assert_eq!(descriptors.last().unwrap().instance_name, "w_12");
    }
}

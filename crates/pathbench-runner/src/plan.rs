use std::ops::Range;

use pathbench_core::{Direction, MapGroupKey, MapKey, TaskLabel};

use crate::config::BenchConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Provision {
        map: MapKey,
    },
    Run {
        algorithm: String,
        map: MapKey,
        trial_index: u32,
        direction: Direction,
        ordinal: usize,
    },
    CloseInstance {
        algorithm: String,
        map: MapKey,
    },
    Report {
        group: MapGroupKey,
    },
}

impl Task {
    pub fn label(&self) -> Option<TaskLabel> {
        match self {
            Task::Provision { map } => Some(TaskLabel::provision(map)),
            Task::Run {
                algorithm,
                map,
                trial_index,
                direction,
                ..
            } => Some(TaskLabel::run(algorithm, map, *trial_index, *direction)),
            Task::CloseInstance { algorithm, map } => Some(TaskLabel {
                algorithm: Some(algorithm.clone()),
                map: map.name(),
                trial_index: None,
                direction: None,
            }),
            Task::Report { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunPlan {
    tasks: Vec<Task>,
    groups: Vec<MapGroupKey>,
    algorithms: Vec<String>,
    instances_per_size: u32,
    records_per_instance: usize,
}

impl RunPlan {
    pub fn new(config: &BenchConfig) -> Self {
        let directions = config.directions.directions();
        let records_per_instance = config.records_per_instance();
        let groups = config.groups();
        let mut tasks = Vec::new();
        for group in &groups {
            for instance in 0..config.instances_per_size {
                let map = group.instance(instance);
                tasks.push(Task::Provision { map: map.clone() });
                for algorithm in &config.algorithms {
                    for trial in 0..config.trials_per_run {
                        for (d, direction) in directions.iter().enumerate() {
                            let ordinal = instance as usize * records_per_instance
                                + trial as usize * directions.len()
                                + d;
                            tasks.push(Task::Run {
                                algorithm: algorithm.clone(),
                                map: map.clone(),
                                trial_index: trial,
                                direction: *direction,
                                ordinal,
                            });
                        }
                    }
                    tasks.push(Task::CloseInstance {
                        algorithm: algorithm.clone(),
                        map: map.clone(),
                    });
                }
            }
            tasks.push(Task::Report {
                group: group.clone(),
            });
        }
        Self {
            tasks,
            groups,
            algorithms: config.algorithms.clone(),
            instances_per_size: config.instances_per_size,
            records_per_instance,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn groups(&self) -> &[MapGroupKey] {
        &self.groups
    }

    pub fn algorithms(&self) -> &[String] {
        &self.algorithms
    }

    pub fn instances_per_size(&self) -> u32 {
        self.instances_per_size
    }

    pub fn records_per_instance(&self) -> usize {
        self.records_per_instance
    }

    pub fn instance_range(&self, instance_index: u32) -> Range<usize> {
        let start = instance_index as usize * self.records_per_instance;
        start..start + self.records_per_instance
    }

    pub fn records_per_log(&self) -> usize {
        self.instances_per_size as usize * self.records_per_instance
    }

    pub fn map_count(&self) -> usize {
        self.groups.len() * self.instances_per_size as usize
    }

    pub fn run_count(&self) -> usize {
        self.groups.len() * self.algorithms.len() * self.records_per_log()
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapGroupKey {
    pub prefix: String,
    pub width: u32,
    pub height: u32,
    pub terrain_cost: u32,
}

impl MapGroupKey {
    pub fn new(prefix: &str, width: u32, height: u32, terrain_cost: u32) -> Self {
        Self {
            prefix: prefix.to_string(),
            width,
            height,
            terrain_cost,
        }
    }

    pub fn name(&self) -> String {
        format!(
            "{}_{}x{}_{}",
            self.prefix, self.width, self.height, self.terrain_cost
        )
    }

    pub fn parse_name(prefix: &str, name: &str) -> Option<Self> {
        let rest = name.strip_prefix(prefix)?.strip_prefix('_')?;
        let (size, cost) = rest.rsplit_once('_')?;
        let (width, height) = size.split_once('x')?;
        Some(Self {
            prefix: prefix.to_string(),
            width: width.parse().ok()?,
            height: height.parse().ok()?,
            terrain_cost: cost.parse().ok()?,
        })
    }

    pub fn instance(&self, instance_index: u32) -> MapKey {
        MapKey {
            group: self.clone(),
            instance_index,
        }
    }
}

impl fmt::Display for MapGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapKey {
    pub group: MapGroupKey,
    pub instance_index: u32,
}

impl MapKey {
    pub fn name(&self) -> String {
        format!("{}_{}", self.group.name(), self.instance_index)
    }

    pub fn width(&self) -> u32 {
        self.group.width
    }

    pub fn height(&self) -> u32 {
        self.group.height
    }

    pub fn terrain_cost(&self) -> u32 {
        self.group.terrain_cost
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoints {
    pub start_x: u32,
    pub start_y: u32,
    pub end_x: u32,
    pub end_y: u32,
}

impl Endpoints {
    pub fn swapped(self) -> Self {
        Self {
            start_x: self.end_x,
            start_y: self.end_y,
            end_x: self.start_x,
            end_y: self.start_y,
        }
    }

    pub fn oriented(self, direction: Direction) -> Self {
        match direction {
            Direction::Forward => self,
            Direction::Reversed => self.swapped(),
        }
    }

    pub fn as_args(&self) -> [String; 4] {
        [
            self.start_x.to_string(),
            self.start_y.to_string(),
            self.end_x.to_string(),
            self.end_y.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Reversed,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reversed => "reversed",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub perf: u64,
    pub dist: u64,
    pub cost: u64,
}

impl RunRecord {
    pub fn to_line(&self) -> String {
        format!("{} {} {}\n", self.perf, self.dist, self.cost)
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let record = Self {
            perf: fields.next()?.parse().ok()?,
            dist: fields.next()?.parse().ok()?,
            cost: fields.next()?.parse().ok()?,
        };
        if fields.next().is_some() {
            return None;
        }
        Some(record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialStdRecord {
    pub std_perf: f64,
    pub std_dist: f64,
    pub std_cost: f64,
}

impl TrialStdRecord {
    pub fn to_line(&self) -> String {
        format!("{} {} {}\n", self.std_perf, self.std_dist, self.std_cost)
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let record = Self {
            std_perf: fields.next()?.parse().ok()?,
            std_dist: fields.next()?.parse().ok()?,
            std_cost: fields.next()?.parse().ok()?,
        };
        if fields.next().is_some() {
            return None;
        }
        Some(record)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub algorithm: String,
    pub group: String,
    pub mean_perf: f64,
    pub mean_dist: f64,
    pub mean_cost: f64,
    pub mean_std: Option<TrialStdRecord>,
    pub run_count: usize,
    pub instance_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLabel {
    pub algorithm: Option<String>,
    pub map: String,
    pub trial_index: Option<u32>,
    pub direction: Option<Direction>,
}

impl TaskLabel {
    pub fn provision(map: &MapKey) -> Self {
        Self {
            algorithm: None,
            map: map.name(),
            trial_index: None,
            direction: None,
        }
    }

    pub fn run(algorithm: &str, map: &MapKey, trial_index: u32, direction: Direction) -> Self {
        Self {
            algorithm: Some(algorithm.to_string()),
            map: map.name(),
            trial_index: Some(trial_index),
            direction: Some(direction),
        }
    }
}

impl fmt::Display for TaskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.algorithm {
            Some(algorithm) => write!(f, "algorithm={} ", algorithm)?,
            None => f.write_str("provision ")?,
        }
        write!(f, "map={}", self.map)?;
        if let Some(trial) = self.trial_index {
            write!(f, " trial={}", trial)?;
        }
        if let Some(direction) = self.direction {
            write!(f, " direction={}", direction)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_and_instance_names_concatenate_key_fields() {
        let group = MapGroupKey::new("run", 100, 200, 255);
        assert_eq!(group.name(), "run_100x200_255");
        assert_eq!(group.instance(3).name(), "run_100x200_255_3");
    }

    #[test]
    fn group_name_parses_back() {
        let group = MapGroupKey::new("run", 10, 12, 1);
        assert_eq!(MapGroupKey::parse_name("run", &group.name()), Some(group));
        assert_eq!(MapGroupKey::parse_name("run", "run_10x12"), None);
        assert_eq!(MapGroupKey::parse_name("other", "run_10x12_1"), None);
    }

    #[test]
    fn reversed_endpoints_swap_start_and_end() {
        let ep = Endpoints {
            start_x: 1,
            start_y: 2,
            end_x: 8,
            end_y: 9,
        };
        assert_eq!(ep.oriented(Direction::Forward), ep);
        assert_eq!(ep.oriented(Direction::Reversed).as_args(), ["8", "9", "1", "2"]);
        assert_eq!(ep.swapped().swapped(), ep);
    }

    #[test]
    fn run_record_line_rejects_extra_or_missing_fields() {
        let rec = RunRecord {
            perf: 5,
            dist: 40,
            cost: 812,
        };
        assert_eq!(rec.to_line(), "5 40 812\n");
        assert_eq!(RunRecord::parse_line("5 40 812"), Some(rec));
        assert_eq!(RunRecord::parse_line("5 40"), None);
        assert_eq!(RunRecord::parse_line("5 40 812 1"), None);
        assert_eq!(RunRecord::parse_line("5 x 812"), None);
    }

    #[test]
    fn task_label_names_every_coordinate_of_the_task() {
        let map = MapGroupKey::new("run", 10, 10, 1).instance(0);
        let label = TaskLabel::run("dijkstra", &map, 1, Direction::Reversed);
        assert_eq!(
            label.to_string(),
            "algorithm=dijkstra map=run_10x10_1_0 trial=1 direction=reversed"
        );
        assert_eq!(TaskLabel::provision(&map).to_string(), "provision map=run_10x10_1_0");
    }
}

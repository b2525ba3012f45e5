use std::fmt;
use std::ops::{Index, IndexMut};

/// One of the two compilation units composing a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::Vertex, Stage::Fragment];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
        }
    }

    fn index(self) -> usize {
        match self {
            Stage::Vertex => 0,
            Stage::Fragment => 1,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed per-stage table. Every stage always has a slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageMap<T> {
    slots: [T; 2],
}

impl<T> StageMap<T> {
    pub fn new(vertex: T, fragment: T) -> Self {
        Self { slots: [vertex, fragment] }
    }

    pub fn get(&self, stage: Stage) -> &T {
        &self.slots[stage.index()]
    }

    pub fn get_mut(&mut self, stage: Stage) -> &mut T {
        &mut self.slots[stage.index()]
    }

    pub fn set(&mut self, stage: Stage, value: T) -> T {
        std::mem::replace(&mut self.slots[stage.index()], value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, &T)> {
        Stage::ALL.into_iter().zip(self.slots.iter())
    }

    pub fn map<U>(&self, mut f: impl FnMut(Stage, &T) -> U) -> StageMap<U> {
        StageMap::new(
            f(Stage::Vertex, self.get(Stage::Vertex)),
            f(Stage::Fragment, self.get(Stage::Fragment)),
        )
    }
}

impl<T> Index<Stage> for StageMap<T> {
    type Output = T;

    fn index(&self, stage: Stage) -> &T {
        self.get(stage)
    }
}

impl<T> IndexMut<Stage> for StageMap<T> {
    fn index_mut(&mut self, stage: Stage) -> &mut T {
        self.get_mut(stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iter_follows_stage_order() {
        let m = StageMap::new("v", "f");
        let v: Vec<_> = m.iter().map(|(s, t)| (s.name(), *t)).collect();
        assert_eq!(v, vec![("vertex", "v"), ("fragment", "f")]);
    }

    #[test]
    fn set_returns_previous_value() {
        let mut m = StageMap::new(1, 2);
        assert_eq!(m.set(Stage::Fragment, 5), 2);
        assert_eq!(m[Stage::Fragment], 5);
        m[Stage::Vertex] += 10;
        assert_eq!(*m.get(Stage::Vertex), 11);
    }
}

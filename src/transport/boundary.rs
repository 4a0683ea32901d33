use std::collections::BTreeMap;

use anyhow::{Result, anyhow};

/// Boundary condition applied to a set of pores of the pressure system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryCondition {
    /// Fixed pressure: p = value.
    FixedValue { value: f64 },
    /// Total volumetric flow into the pore group in m^3/s, positive into the
    /// network.
    ///
    /// How the total is split across the group is decided by the solver
    /// (evenly, or through a virtual super pore).
    GroupFlow { rate: f64 },
}

/// How a registration combines with existing conditions of the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcMode {
    /// Keep existing conditions on other pores; the given pores take the new one.
    Merge,
    /// Drop every existing condition of this type first.
    Overwrite,
    /// Drop conditions of this type from the given pores.
    Remove,
}

/// Pores sharing one group-flow condition.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowGroup {
    pub pores: Vec<usize>,
    pub rate: f64,
}

/// Boundary conditions of the pressure system.
///
/// A pore carries at most one condition: fixed-value and group-flow pores are
/// disjoint.
#[derive(Debug, Clone, Default)]
pub struct BoundaryConditions {
    fixed: BTreeMap<usize, f64>,
    groups: Vec<FlowGroup>,
}

impl BoundaryConditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `bc` on `pores`.
    ///
    /// Fails without changing anything if a fixed-value pore would also belong
    /// to a flow group.
    pub fn set(&mut self, bc: BoundaryCondition, pores: &[usize], mode: BcMode) -> Result<()> {
        match bc {
            BoundaryCondition::FixedValue { value } => {
                if mode != BcMode::Remove
                    && let Some(p) = pores.iter().find(|p| self.group_of(**p).is_some())
                {
                    return Err(anyhow!(
                        "Pore {p} already carries a group-flow condition"
                    ));
                }
                match mode {
                    BcMode::Overwrite => {
                        self.fixed.clear();
                        self.fixed.extend(pores.iter().map(|&p| (p, value)));
                    }
                    BcMode::Merge => {
                        self.fixed.extend(pores.iter().map(|&p| (p, value)));
                    }
                    BcMode::Remove => {
                        for p in pores {
                            self.fixed.remove(p);
                        }
                    }
                }
            }
            BoundaryCondition::GroupFlow { rate } => {
                if mode != BcMode::Remove
                    && let Some(p) = pores.iter().find(|p| self.fixed.contains_key(p))
                {
                    return Err(anyhow!(
                        "Pore {p} already carries a fixed-value condition"
                    ));
                }
                match mode {
                    BcMode::Overwrite => {
                        self.groups.clear();
                        self.push_group(pores, rate);
                    }
                    BcMode::Merge => {
                        self.remove_from_groups(pores);
                        match self.groups.iter_mut().find(|g| g.rate == rate) {
                            Some(group) => {
                                group.pores.extend_from_slice(pores);
                                group.pores.sort_unstable();
                                group.pores.dedup();
                            }
                            None => self.push_group(pores, rate),
                        }
                    }
                    BcMode::Remove => self.remove_from_groups(pores),
                }
            }
        }
        Ok(())
    }

    /// Fixed pressure at `pore`, if any.
    pub fn fixed_value(&self, pore: usize) -> Option<f64> {
        self.fixed.get(&pore).copied()
    }

    /// All fixed-value pores, ascending.
    pub fn fixed_pores(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.fixed.iter().map(|(&p, &v)| (p, v))
    }

    pub fn groups(&self) -> &[FlowGroup] {
        &self.groups
    }

    /// Index of the flow group containing `pore`.
    pub fn group_of(&self, pore: usize) -> Option<usize> {
        self.groups.iter().position(|g| g.pores.contains(&pore))
    }

    fn push_group(&mut self, pores: &[usize], rate: f64) {
        if pores.is_empty() {
            return;
        }
        let mut pores = pores.to_vec();
        pores.sort_unstable();
        pores.dedup();
        self.groups.push(FlowGroup { pores, rate });
    }

    fn remove_from_groups(&mut self, pores: &[usize]) {
        for group in &mut self.groups {
            group.pores.retain(|p| !pores.contains(p));
        }
        self.groups.retain(|g| !g.pores.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_value_modes() {
        let mut bcs = BoundaryConditions::new();
        let zero = BoundaryCondition::FixedValue { value: 0.0 };
        bcs.set(zero, &[4, 5], BcMode::Merge).unwrap();
        bcs.set(BoundaryCondition::FixedValue { value: 2.0 }, &[5, 6], BcMode::Merge)
            .unwrap();
        assert_eq!(bcs.fixed_value(4), Some(0.0));
        assert_eq!(bcs.fixed_value(5), Some(2.0));

        bcs.set(zero, &[1], BcMode::Overwrite).unwrap();
        assert_eq!(bcs.fixed_pores().collect::<Vec<_>>(), vec![(1, 0.0)]);

        bcs.set(zero, &[1], BcMode::Remove).unwrap();
        assert_eq!(bcs.fixed_pores().count(), 0);
    }

    #[test]
    fn test_group_merge_combines_equal_rates() {
        let mut bcs = BoundaryConditions::new();
        let inj = BoundaryCondition::GroupFlow { rate: 1e-9 };
        bcs.set(inj, &[0, 1], BcMode::Merge).unwrap();
        bcs.set(inj, &[1, 2], BcMode::Merge).unwrap();
        assert_eq!(bcs.groups().len(), 1);
        assert_eq!(bcs.groups()[0].pores, vec![0, 1, 2]);

        bcs.set(BoundaryCondition::GroupFlow { rate: 2e-9 }, &[2], BcMode::Merge)
            .unwrap();
        assert_eq!(bcs.groups().len(), 2);
        assert_eq!(bcs.groups()[0].pores, vec![0, 1]);
        assert_eq!(bcs.group_of(2), Some(1));
    }

    #[test]
    fn test_group_overwrite_and_remove() {
        let mut bcs = BoundaryConditions::new();
        let inj = BoundaryCondition::GroupFlow { rate: 1.0 };
        bcs.set(inj, &[0, 1], BcMode::Overwrite).unwrap();
        bcs.set(inj, &[3], BcMode::Overwrite).unwrap();
        assert_eq!(bcs.groups(), &[FlowGroup { pores: vec![3], rate: 1.0 }]);

        bcs.set(inj, &[3], BcMode::Remove).unwrap();
        assert!(bcs.groups().is_empty());
    }

    #[test]
    fn test_conflicting_types_are_rejected_without_change() {
        let mut bcs = BoundaryConditions::new();
        bcs.set(BoundaryCondition::GroupFlow { rate: 1.0 }, &[0], BcMode::Merge)
            .unwrap();
        let err = bcs.set(BoundaryCondition::FixedValue { value: 0.0 }, &[0, 1], BcMode::Merge);
        assert!(err.is_err());
        assert_eq!(bcs.fixed_pores().count(), 0);

        bcs.set(BoundaryCondition::FixedValue { value: 0.0 }, &[1], BcMode::Merge)
            .unwrap();
        assert!(
            bcs.set(BoundaryCondition::GroupFlow { rate: 1.0 }, &[1], BcMode::Overwrite)
                .is_err()
        );
        assert_eq!(bcs.groups()[0].pores, vec![0]);
    }
}

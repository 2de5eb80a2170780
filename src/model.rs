//! Feature models: a feature tree plus cross-tree constraints.
//!
//! Features live in an arena indexed by [`FeatureId`]. Each feature owns the
//! ordered list of its children and keeps only a back-reference to its
//! parent. Names are unique and serve as the lookup key everywhere outside
//! this module.
//!
//! [`FeatureModel::traced_elements`] translates the model into propositional
//! formulas, each tagged with the [`Origin`] it was derived from. This is the
//! clause source of the explanation engine and the analyzer.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use log::debug;

use crate::error::ModelError;
use crate::formula::Formula;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(usize);

/// Stable identifier of a cross-tree constraint. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(u32);

impl ConstraintId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Display for ConstraintId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Relation between a feature and its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GroupKind {
    #[default]
    And,
    Or,
    Alternative,
}

impl Display for GroupKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            GroupKind::And => write!(f, "and"),
            GroupKind::Or => write!(f, "or"),
            GroupKind::Alternative => write!(f, "alternative"),
        }
    }
}

/// Where a traced formula comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Origin {
    /// A parent requires its (mandatory or grouped) children.
    ChildDown,
    /// Mutual exclusion of two alternatives.
    ChildHorizontal,
    /// A child requires its parent.
    ChildUp,
    /// The root is always selected.
    Root,
    /// A user-authored cross-tree constraint.
    Constraint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    id: FeatureId,
    name: String,
    parent: Option<FeatureId>,
    group: GroupKind,
    mandatory: bool,
    children: Vec<FeatureId>,
}

impl Feature {
    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<FeatureId> {
        self.parent
    }

    /// Group kind governing this feature's children.
    pub fn group(&self) -> GroupKind {
        self.group
    }

    pub fn children(&self) -> &[FeatureId] {
        &self.children
    }

    /// Raw mandatory flag. See [`FeatureModel::is_mandatory`] for the effective value.
    pub fn mandatory_flag(&self) -> bool {
        self.mandatory
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    id: ConstraintId,
    name: String,
    formula: Formula,
}

impl Constraint {
    pub fn id(&self) -> ConstraintId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }
}

/// An origin-tagged formula derived from the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracedElement {
    pub origin: Origin,
    pub formula: Formula,
    /// Set for elements of origin [`Origin::Constraint`].
    pub constraint: Option<ConstraintId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureModel {
    features: Vec<Option<Feature>>,
    by_name: HashMap<String, FeatureId>,
    root: FeatureId,
    constraints: Vec<Constraint>,
    next_constraint: u32,
}

impl FeatureModel {
    pub fn new(root: impl Into<String>) -> Self {
        let name = root.into();
        let id = FeatureId(0);
        let mut by_name = HashMap::new();
        by_name.insert(name.clone(), id);
        Self {
            features: vec![Some(Feature {
                id,
                name,
                parent: None,
                group: GroupKind::And,
                mandatory: false,
                children: Vec::new(),
            })],
            by_name,
            root: id,
            constraints: Vec::new(),
            next_constraint: 0,
        }
    }

    fn get(&self, id: FeatureId) -> &Feature {
        match &self.features[id.0] {
            Some(feature) => feature,
            None => unreachable!("dangling feature id {:?}", id),
        }
    }

    fn get_mut(&mut self, id: FeatureId) -> &mut Feature {
        match &mut self.features[id.0] {
            Some(feature) => feature,
            None => unreachable!("dangling feature id {:?}", id),
        }
    }

    fn id_of(&self, name: &str) -> Result<FeatureId, ModelError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ModelError::UnknownFeature(name.to_string()))
    }

    fn add_child(&mut self, parent: &str, name: &str, mandatory: bool) -> Result<FeatureId, ModelError> {
        if self.by_name.contains_key(name) {
            return Err(ModelError::DuplicateFeature(name.to_string()));
        }
        let parent = self.id_of(parent)?;
        let id = FeatureId(self.features.len());
        self.features.push(Some(Feature {
            id,
            name: name.to_string(),
            parent: Some(parent),
            group: GroupKind::And,
            mandatory,
            children: Vec::new(),
        }));
        self.by_name.insert(name.to_string(), id);
        self.get_mut(parent).children.push(id);
        Ok(id)
    }

    /// Add an optional child feature.
    pub fn add_feature(&mut self, parent: &str, name: &str) -> Result<FeatureId, ModelError> {
        self.add_child(parent, name, false)
    }

    /// Add a mandatory child feature.
    pub fn add_mandatory(&mut self, parent: &str, name: &str) -> Result<FeatureId, ModelError> {
        self.add_child(parent, name, true)
    }

    /// Set the group kind below `name`.
    pub fn set_group(&mut self, name: &str, group: GroupKind) -> Result<(), ModelError> {
        let id = self.id_of(name)?;
        self.get_mut(id).group = group;
        Ok(())
    }

    pub fn set_mandatory(&mut self, name: &str, mandatory: bool) -> Result<(), ModelError> {
        let id = self.id_of(name)?;
        self.get_mut(id).mandatory = mandatory;
        Ok(())
    }

    pub fn add_constraint(&mut self, formula: Formula) -> ConstraintId {
        let name = formula.to_string();
        self.add_named_constraint(name, formula)
    }

    pub fn add_named_constraint(&mut self, name: impl Into<String>, formula: Formula) -> ConstraintId {
        let id = ConstraintId(self.next_constraint);
        self.next_constraint += 1;
        self.constraints.push(Constraint {
            id,
            name: name.into(),
            formula,
        });
        id
    }

    pub fn root(&self) -> &Feature {
        self.get(self.root)
    }

    pub fn root_name(&self) -> &str {
        &self.root().name
    }

    pub fn is_root(&self, name: &str) -> bool {
        self.root_name() == name
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.by_name.get(name).map(|&id| self.get(id))
    }

    pub fn contains_feature(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Features in tree pre-order, starting at the root.
    pub fn features(&self) -> Vec<&Feature> {
        let mut result = Vec::with_capacity(self.by_name.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let feature = self.get(id);
            result.push(feature);
            stack.extend(feature.children.iter().rev().copied());
        }
        result
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.features().into_iter().map(|f| f.name.clone()).collect()
    }

    pub fn num_features(&self) -> usize {
        self.by_name.len()
    }

    pub fn parent(&self, name: &str) -> Option<&Feature> {
        let feature = self.feature(name)?;
        feature.parent.map(|id| self.get(id))
    }

    pub fn children(&self, name: &str) -> Vec<&Feature> {
        match self.feature(name) {
            Some(feature) => feature.children.iter().map(|&id| self.get(id)).collect(),
            None => Vec::new(),
        }
    }

    /// Effective mandatory flag: always false below OR and ALTERNATIVE groups.
    pub fn is_mandatory(&self, name: &str) -> bool {
        match (self.feature(name), self.parent(name)) {
            (Some(feature), Some(parent)) => feature.mandatory && parent.group == GroupKind::And,
            _ => false,
        }
    }

    /// The feature itself followed by all its ancestors up to the root.
    pub fn ancestors(&self, name: &str) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut current = self.feature(name);
        while let Some(feature) = current {
            chain.push(feature.name.as_str());
            current = feature.parent.map(|id| self.get(id));
        }
        chain
    }

    /// Deepest feature lying on the ancestor chain (self included) of every name.
    pub fn common_ancestor(&self, names: &[&str]) -> Option<&str> {
        let (first, rest) = names.split_first()?;
        let chains: Vec<Vec<&str>> = rest.iter().map(|name| self.ancestors(name)).collect();
        self.ancestors(first)
            .into_iter()
            .find(|candidate| chains.iter().all(|chain| chain.contains(candidate)))
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == id)
    }

    /// First constraint whose formula is structurally equal to `formula`.
    pub fn find_constraint(&self, formula: &Formula) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.formula == *formula)
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> bool {
        let before = self.constraints.len();
        self.constraints.retain(|c| c.id != id);
        self.constraints.len() != before
    }

    /// Replace the formula of a constraint. The display name follows the formula.
    pub fn set_constraint_formula(&mut self, id: ConstraintId, formula: Formula) -> bool {
        match self.constraints.iter_mut().find(|c| c.id == id) {
            Some(constraint) => {
                constraint.name = formula.to_string();
                constraint.formula = formula;
                true
            }
            None => false,
        }
    }

    /// Remove a feature from the tree.
    ///
    /// Its children take its place under its parent. A group left with fewer
    /// than two children becomes an AND group, and a single remaining child
    /// becomes mandatory. Constraints are left untouched.
    pub fn delete_feature(&mut self, name: &str) -> Result<(), ModelError> {
        let id = self.id_of(name)?;
        let Some(parent) = self.get(id).parent else {
            return Err(ModelError::CannotRemoveRoot(name.to_string()));
        };
        debug!("delete_feature(name = {})", name);

        let children = std::mem::take(&mut self.get_mut(id).children);
        for &child in &children {
            self.get_mut(child).parent = Some(parent);
        }
        let siblings = &mut self.get_mut(parent).children;
        if let Some(pos) = siblings.iter().position(|&c| c == id) {
            siblings.remove(pos);
            for (offset, child) in children.into_iter().enumerate() {
                siblings.insert(pos + offset, child);
            }
        }

        self.features[id.0] = None;
        self.by_name.remove(name);
        self.normalize_group(parent);
        Ok(())
    }

    fn normalize_group(&mut self, id: FeatureId) {
        let feature = self.get(id);
        if feature.group == GroupKind::And || feature.children.len() >= 2 {
            return;
        }
        debug!("normalize_group: '{}' has {} children left", feature.name, feature.children.len());
        let only_child = feature.children.first().copied();
        self.get_mut(id).group = GroupKind::And;
        if let Some(child) = only_child {
            self.get_mut(child).mandatory = true;
        }
    }

    /// A name based on `base` that no feature uses yet.
    pub fn fresh_name(&self, base: &str) -> String {
        if !self.contains_feature(base) {
            return base.to_string();
        }
        (2..)
            .map(|i| format!("{}{}", base, i))
            .find(|name| !self.contains_feature(name))
            .unwrap_or_else(|| base.to_string())
    }

    /// Move `members`, all children of `parent`, below a new grouping feature.
    ///
    /// The new feature takes the position of the first member and is optional.
    pub fn insert_group_feature(
        &mut self,
        parent: &str,
        name: &str,
        members: &[&str],
        group: GroupKind,
    ) -> Result<FeatureId, ModelError> {
        if self.by_name.contains_key(name) {
            return Err(ModelError::DuplicateFeature(name.to_string()));
        }
        let parent_id = self.id_of(parent)?;
        let mut member_ids = Vec::with_capacity(members.len());
        for member in members {
            let id = self.id_of(member)?;
            if self.get(id).parent != Some(parent_id) {
                return Err(ModelError::NotSiblings(
                    members.iter().map(|m| m.to_string()).collect(),
                    parent.to_string(),
                ));
            }
            member_ids.push(id);
        }

        let id = FeatureId(self.features.len());
        let siblings = &self.get(parent_id).children;
        let position = siblings
            .iter()
            .position(|c| member_ids.contains(c))
            .unwrap_or(siblings.len());
        let ordered: Vec<FeatureId> = siblings.iter().copied().filter(|c| member_ids.contains(c)).collect();

        self.features.push(Some(Feature {
            id,
            name: name.to_string(),
            parent: Some(parent_id),
            group,
            mandatory: false,
            children: ordered.clone(),
        }));
        self.by_name.insert(name.to_string(), id);
        for &member in &ordered {
            self.get_mut(member).parent = Some(id);
        }
        let siblings = &mut self.get_mut(parent_id).children;
        siblings.retain(|c| !member_ids.contains(c));
        siblings.insert(position.min(siblings.len()), id);
        Ok(id)
    }

    /// The model as origin-tagged formulas.
    ///
    /// Tree elements come first, in pre-order, followed by the cross-tree
    /// constraints in model order.
    pub fn traced_elements(&self) -> Vec<TracedElement> {
        let tree = |origin, formula| TracedElement {
            origin,
            formula,
            constraint: None,
        };
        let mut elements = vec![tree(Origin::Root, Formula::var(self.root_name()))];

        for feature in self.features() {
            let parent = Formula::var(&feature.name);
            let children: Vec<&Feature> = feature.children.iter().map(|&id| self.get(id)).collect();
            match feature.group {
                GroupKind::And => {
                    for child in children.iter().filter(|c| c.mandatory) {
                        elements.push(tree(
                            Origin::ChildDown,
                            Formula::implies(parent.clone(), Formula::var(&child.name)),
                        ));
                    }
                }
                GroupKind::Or | GroupKind::Alternative => {
                    if !children.is_empty() {
                        elements.push(tree(
                            Origin::ChildDown,
                            Formula::implies(
                                parent.clone(),
                                Formula::or(children.iter().map(|c| Formula::var(&c.name))),
                            ),
                        ));
                    }
                    if feature.group == GroupKind::Alternative {
                        for (i, a) in children.iter().enumerate() {
                            for b in &children[i + 1..] {
                                elements.push(tree(
                                    Origin::ChildHorizontal,
                                    Formula::or([Formula::lit(&a.name, false), Formula::lit(&b.name, false)]),
                                ));
                            }
                        }
                    }
                }
            }
            for child in &children {
                elements.push(tree(
                    Origin::ChildUp,
                    Formula::implies(Formula::var(&child.name), parent.clone()),
                ));
            }
        }

        for constraint in &self.constraints {
            elements.push(TracedElement {
                origin: Origin::Constraint,
                formula: constraint.formula.clone(),
                constraint: Some(constraint.id),
            });
        }
        elements
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn sentence() -> FeatureModel {
        let mut model = FeatureModel::new("Sentence");
        model.add_mandatory("Sentence", "Hello").unwrap();
        model.add_feature("Sentence", "Feature").unwrap();
        model.add_feature("Feature", "Beautiful").unwrap();
        model.add_feature("Feature", "Wonderful").unwrap();
        model.set_group("Feature", GroupKind::Alternative).unwrap();
        model.add_mandatory("Sentence", "World").unwrap();
        model
    }

    #[test]
    fn test_lookup() {
        let model = sentence();
        assert_eq!(model.root_name(), "Sentence");
        assert_eq!(model.num_features(), 6);
        assert_eq!(model.parent("Beautiful").unwrap().name(), "Feature");
        assert!(model.parent("Sentence").is_none());
        assert_eq!(
            model.feature_names(),
            vec!["Sentence", "Hello", "Feature", "Beautiful", "Wonderful", "World"]
        );
    }

    #[test]
    fn test_duplicate_feature() {
        let mut model = sentence();
        assert_eq!(
            model.add_feature("Sentence", "Hello"),
            Err(ModelError::DuplicateFeature("Hello".to_string()))
        );
        assert_eq!(
            model.add_feature("Nowhere", "X"),
            Err(ModelError::UnknownFeature("Nowhere".to_string()))
        );
    }

    #[test]
    fn test_mandatory_is_derived_from_parent_group() {
        let mut model = sentence();
        assert!(model.is_mandatory("Hello"));
        assert!(!model.is_mandatory("Feature"));
        model.set_mandatory("Beautiful", true).unwrap();
        assert!(!model.is_mandatory("Beautiful"));
        assert!(!model.is_mandatory("Sentence"));
    }

    #[test]
    fn test_common_ancestor() {
        let model = sentence();
        assert_eq!(model.common_ancestor(&["Beautiful", "Wonderful"]), Some("Feature"));
        assert_eq!(model.common_ancestor(&["Beautiful", "Hello"]), Some("Sentence"));
        assert_eq!(model.common_ancestor(&["Beautiful", "Feature"]), Some("Feature"));
        assert_eq!(model.common_ancestor(&["Beautiful", "Missing"]), None);
    }

    #[test]
    fn test_traced_elements() {
        let mut model = sentence();
        let id = model.add_constraint(Formula::implies(Formula::var("Hello"), Formula::var("Beautiful")));
        let elements = model.traced_elements();

        let shown: Vec<(Origin, String)> = elements.iter().map(|e| (e.origin, e.formula.to_string())).collect();
        assert_eq!(shown[0], (Origin::Root, "Sentence".to_string()));
        assert!(shown.contains(&(Origin::ChildDown, "Sentence => Hello".to_string())));
        assert!(shown.contains(&(Origin::ChildDown, "Feature => (Beautiful | Wonderful)".to_string())));
        assert!(shown.contains(&(Origin::ChildHorizontal, "-Beautiful | -Wonderful".to_string())));
        assert!(shown.contains(&(Origin::ChildUp, "Beautiful => Feature".to_string())));
        assert!(!shown.contains(&(Origin::ChildDown, "Sentence => Feature".to_string())));

        let last = elements.last().unwrap();
        assert_eq!(last.origin, Origin::Constraint);
        assert_eq!(last.constraint, Some(id));
    }

    #[test]
    fn test_delete_feature_normalizes_group() {
        let mut model = sentence();
        model.delete_feature("Wonderful").unwrap();
        let feature = model.feature("Feature").unwrap();
        assert_eq!(feature.group(), GroupKind::And);
        assert!(model.is_mandatory("Beautiful"));
        assert!(!model.contains_feature("Wonderful"));
        assert_eq!(
            model.delete_feature("Sentence"),
            Err(ModelError::CannotRemoveRoot("Sentence".to_string()))
        );
    }

    #[test]
    fn test_delete_feature_reattaches_children() {
        let mut model = sentence();
        model.delete_feature("Feature").unwrap();
        assert_eq!(model.parent("Beautiful").unwrap().name(), "Sentence");
        assert_eq!(
            model.feature_names(),
            vec!["Sentence", "Hello", "Beautiful", "Wonderful", "World"]
        );
    }

    #[test]
    fn test_insert_group_feature() {
        let mut model = FeatureModel::new("Root");
        for name in ["A", "B", "C", "D"] {
            model.add_feature("Root", name).unwrap();
        }
        model.set_group("Root", GroupKind::Alternative).unwrap();
        let name = model.fresh_name("Root_Alternative");
        model
            .insert_group_feature("Root", &name, &["C", "B"], GroupKind::Alternative)
            .unwrap();
        assert_eq!(model.feature_names(), vec!["Root", "A", "Root_Alternative", "B", "C", "D"]);
        assert_eq!(model.parent("C").unwrap().name(), "Root_Alternative");
        assert_eq!(model.fresh_name("Root_Alternative"), "Root_Alternative2");
        assert!(matches!(
            model.insert_group_feature("Root", "G", &["A", "B"], GroupKind::Or),
            Err(ModelError::NotSiblings(_, _))
        ));
    }

    #[test]
    fn test_constraint_ids_are_stable() {
        let mut model = sentence();
        let a = model.add_constraint(Formula::var("Hello"));
        let b = model.add_constraint(Formula::not(Formula::var("Beautiful")));
        assert!(model.remove_constraint(a));
        assert!(!model.remove_constraint(a));
        assert_eq!(model.constraint(b).unwrap().name(), "-Beautiful");
        let c = model.add_constraint(Formula::var("World"));
        assert_ne!(a, c);
        assert!(model.set_constraint_formula(b, Formula::var("Beautiful")));
        assert_eq!(model.constraint(b).unwrap().name(), "Beautiful");
        assert!(model.find_constraint(&Formula::var("World")).is_some());
    }
}

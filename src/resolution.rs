//! The catalog of structural edits proposed for defects.
//!
//! A [`Resolution`] is a [`ResolutionKind`] plus label decorations. Only the
//! kind takes part in equality and hashing, so the same edit proposed on
//! behalf of two different defects collapses into one entry of a
//! [`ResolutionSet`].
//!
//! Applying a resolution always runs the full editor protocol (begin, mutate,
//! save, release) and always releases the editor, even on failure. Edits that
//! target something that no longer exists are reported as
//! [`ApplyOutcome::Stale`] and leave the model untouched.

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};

use log::{debug, info};

use crate::editor::ModelEditor;
use crate::error::{EditError, ModelError};
use crate::formula::Formula;
use crate::model::{FeatureModel, GroupKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolutionKind {
    DeleteConstraint(Formula),
    /// Hand the constraint to a human for manual editing.
    EditConstraint(Formula),
    ReplaceConstraint { old: Formula, new: Formula },
    CreateConstraint(Formula),
    DeleteFeature(String),
    MakeOptional(String),
    MakeMandatory { feature: String, ancestor: String },
    ConvertAlternativeToOr(String),
    /// Informational: other defects should be fixed first.
    AwaitOther { features: Vec<String>, affected: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The model already had the requested shape.
    Unchanged,
    /// The target is gone. Nothing was changed.
    Stale,
    /// The constraint was handed to the editor for manual editing.
    ManualEdit,
    Informational,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    kind: ResolutionKind,
    prefix: String,
    postfix: String,
}

impl PartialEq for Resolution {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Resolution {}

impl Hash for Resolution {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}

impl From<ResolutionKind> for Resolution {
    fn from(kind: ResolutionKind) -> Self {
        Resolution::new(kind)
    }
}

fn quoted(names: &[String]) -> String {
    names.iter().map(|n| format!("'{}'", n)).collect::<Vec<_>>().join(", ")
}

impl Resolution {
    pub fn new(kind: ResolutionKind) -> Self {
        Self {
            kind,
            prefix: String::new(),
            postfix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_postfix(mut self, postfix: impl Into<String>) -> Self {
        self.postfix = postfix.into();
        self
    }

    pub fn kind(&self) -> &ResolutionKind {
        &self.kind
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn postfix(&self) -> &str {
        &self.postfix
    }

    /// Human-readable description: prefix, core text, postfix.
    pub fn label(&self) -> String {
        let core = match &self.kind {
            ResolutionKind::DeleteConstraint(f) => format!("Delete the constraint '{}'", f),
            ResolutionKind::EditConstraint(f) => format!("Edit the constraint '{}'", f),
            ResolutionKind::ReplaceConstraint { old, new } => {
                format!("Change the constraint '{}' to '{}'", old, new)
            }
            ResolutionKind::CreateConstraint(f) => format!("Create the constraint '{}'", f),
            ResolutionKind::DeleteFeature(_) => "Delete the affected feature".to_string(),
            ResolutionKind::MakeOptional(name) => format!("Make the feature '{}' optional", name),
            ResolutionKind::MakeMandatory { feature, ancestor } => {
                format!("Make the feature '{}' mandatory under '{}'", feature, ancestor)
            }
            ResolutionKind::ConvertAlternativeToOr(parent) => {
                format!("Change the alternative-relation below '{}' to an or-relation", parent)
            }
            ResolutionKind::AwaitOther { features, affected } => format!(
                "Skip to resolve {} first? It might have an effect on '{}'.",
                quoted(features),
                affected
            ),
        };
        format!("{}{}{}", self.prefix, core, self.postfix)
    }

    /// Apply atomically: begin, mutate, save on change, and always release.
    pub fn apply(&self, editor: &mut dyn ModelEditor) -> Result<ApplyOutcome, EditError> {
        editor.begin_edit()?;
        let result = self.apply_in_edit(editor);
        editor.release();
        match &result {
            Ok(outcome) => info!("apply '{}': {:?}", self.label(), outcome),
            Err(err) => info!("apply '{}' failed: {}", self.label(), err),
        }
        result
    }

    fn apply_in_edit(&self, editor: &mut dyn ModelEditor) -> Result<ApplyOutcome, EditError> {
        match &self.kind {
            ResolutionKind::AwaitOther { .. } => Ok(ApplyOutcome::Informational),
            ResolutionKind::EditConstraint(formula) => {
                let snapshot = editor.snapshot();
                match snapshot.find_constraint(formula) {
                    Some(constraint) => {
                        editor.open_constraint_editor(constraint);
                        Ok(ApplyOutcome::ManualEdit)
                    }
                    None => Ok(ApplyOutcome::Stale),
                }
            }
            kind => {
                let outcome = editor.mutate(&mut |model| kind.apply_to(model))?;
                if outcome == ApplyOutcome::Applied {
                    editor.save()?;
                }
                Ok(outcome)
            }
        }
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl ResolutionKind {
    /// Structural effect on the model. Edit and informational kinds are no-ops here.
    pub fn apply_to(&self, model: &mut FeatureModel) -> Result<ApplyOutcome, ModelError> {
        match self {
            ResolutionKind::DeleteConstraint(formula) => match model.find_constraint(formula).map(|c| c.id()) {
                Some(id) => {
                    model.remove_constraint(id);
                    Ok(ApplyOutcome::Applied)
                }
                None => Ok(ApplyOutcome::Stale),
            },
            ResolutionKind::ReplaceConstraint { old, new } => match model.find_constraint(old).map(|c| c.id()) {
                Some(id) => {
                    model.set_constraint_formula(id, new.clone());
                    Ok(ApplyOutcome::Applied)
                }
                None => Ok(ApplyOutcome::Stale),
            },
            ResolutionKind::CreateConstraint(formula) => {
                if model.find_constraint(formula).is_some() {
                    return Ok(ApplyOutcome::Unchanged);
                }
                model.add_constraint(formula.clone());
                Ok(ApplyOutcome::Applied)
            }
            ResolutionKind::DeleteFeature(name) => delete_feature(model, name),
            ResolutionKind::MakeOptional(name) => match model.feature(name) {
                None => Ok(ApplyOutcome::Stale),
                Some(feature) if !feature.mandatory_flag() => Ok(ApplyOutcome::Unchanged),
                Some(_) => {
                    model.set_mandatory(name, false)?;
                    Ok(ApplyOutcome::Applied)
                }
            },
            ResolutionKind::MakeMandatory { feature, ancestor } => make_mandatory(model, feature, ancestor),
            ResolutionKind::ConvertAlternativeToOr(parent) => match model.feature(parent).map(|f| f.group()) {
                None => Ok(ApplyOutcome::Stale),
                Some(GroupKind::Alternative) => {
                    model.set_group(parent, GroupKind::Or)?;
                    Ok(ApplyOutcome::Applied)
                }
                Some(_) => Ok(ApplyOutcome::Unchanged),
            },
            ResolutionKind::EditConstraint(_) => Ok(ApplyOutcome::ManualEdit),
            ResolutionKind::AwaitOther { .. } => Ok(ApplyOutcome::Informational),
        }
    }
}

/// Remove a feature and every trace of it in the constraints.
///
/// The feature is replaced by `false`. Constraints that become `True` are
/// deleted; the others keep their simplified remainder.
fn delete_feature(model: &mut FeatureModel, name: &str) -> Result<ApplyOutcome, ModelError> {
    if !model.contains_feature(name) {
        return Ok(ApplyOutcome::Stale);
    }
    if model.is_root(name) {
        return Err(ModelError::CannotRemoveRoot(name.to_string()));
    }

    let affected: Vec<_> = model
        .constraints()
        .iter()
        .filter(|c| c.formula().contains_feature(name))
        .map(|c| (c.id(), c.formula().assign(name, false)))
        .collect();
    for (id, formula) in affected {
        if formula == Formula::True {
            debug!("delete_feature: dropping constraint {}", id);
            model.remove_constraint(id);
        } else {
            model.set_constraint_formula(id, formula);
        }
    }

    model.delete_feature(name)?;
    Ok(ApplyOutcome::Applied)
}

/// Walk from `feature` up to `ancestor`, making each step mandatory.
fn make_mandatory(model: &mut FeatureModel, feature: &str, ancestor: &str) -> Result<ApplyOutcome, ModelError> {
    if !model.contains_feature(feature) || !model.contains_feature(ancestor) {
        return Ok(ApplyOutcome::Stale);
    }
    if !model.ancestors(feature).contains(&ancestor) {
        return Ok(ApplyOutcome::Stale);
    }

    let mut current = feature.to_string();
    while current != ancestor {
        let Some(parent) = model.parent(&current) else {
            break;
        };
        let parent_name = parent.name().to_string();
        let group = parent.group();
        let others: Vec<String> = model
            .children(&parent_name)
            .iter()
            .map(|c| c.name().to_string())
            .filter(|name| *name != current)
            .collect();

        match group {
            GroupKind::Alternative => {
                model.set_group(&parent_name, GroupKind::And)?;
                match others.as_slice() {
                    [] => {}
                    [single] => model.set_mandatory(single, false)?,
                    many => {
                        let name = model.fresh_name(&format!("{}_Alternative", parent_name));
                        let members: Vec<&str> = many.iter().map(String::as_str).collect();
                        debug!("make_mandatory: grouping {:?} below new feature '{}'", members, name);
                        model.insert_group_feature(&parent_name, &name, &members, GroupKind::Alternative)?;
                    }
                }
            }
            GroupKind::Or => {
                model.set_group(&parent_name, GroupKind::And)?;
                for other in &others {
                    model.set_mandatory(other, false)?;
                }
            }
            GroupKind::And => {}
        }
        model.set_mandatory(&current, true)?;
        current = parent_name;
    }
    Ok(ApplyOutcome::Applied)
}

/// Resolutions in insertion order, without duplicates.
#[derive(Debug, Clone, Default)]
pub struct ResolutionSet {
    items: Vec<Resolution>,
    seen: HashSet<ResolutionKind>,
}

impl ResolutionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless an equal resolution is present. Returns true if inserted.
    pub fn insert(&mut self, resolution: Resolution) -> bool {
        if !self.seen.insert(resolution.kind.clone()) {
            return false;
        }
        debug!("proposing: {}", resolution.label());
        self.items.push(resolution);
        true
    }

    pub fn contains(&self, kind: &ResolutionKind) -> bool {
        self.seen.contains(kind)
    }

    pub fn get(&self, kind: &ResolutionKind) -> Option<&Resolution> {
        self.items.iter().find(|r| r.kind == *kind)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resolution> {
        self.items.iter()
    }

    pub fn labels(&self) -> Vec<String> {
        self.items.iter().map(Resolution::label).collect()
    }
}

impl Extend<Resolution> for ResolutionSet {
    fn extend<T: IntoIterator<Item = Resolution>>(&mut self, iter: T) {
        for resolution in iter {
            self.insert(resolution);
        }
    }
}

impl<'a> IntoIterator for &'a ResolutionSet {
    type Item = &'a Resolution;
    type IntoIter = std::slice::Iter<'a, Resolution>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for ResolutionSet {
    type Item = Resolution;
    type IntoIter = std::vec::IntoIter<Resolution>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

//! Transactional access to a feature model.
//!
//! Resolutions never touch a model directly. They go through a
//! [`ModelEditor`]: `begin_edit` takes the edit lock and a working copy,
//! `mutate` changes the working copy, `save` publishes it, and `release`
//! drops the lock together with any unsaved changes.

use std::sync::mpsc::{channel, Receiver, Sender};

use log::{debug, warn};

use crate::error::{EditError, ModelError};
use crate::model::{Constraint, ConstraintId, FeatureModel};
use crate::resolution::ApplyOutcome;

pub trait ModelEditor {
    /// Take the edit lock. Fails with [`EditError::Busy`] if it is held.
    fn begin_edit(&mut self) -> Result<(), EditError>;

    /// Run `edit` on the working copy.
    fn mutate(
        &mut self,
        edit: &mut dyn FnMut(&mut FeatureModel) -> Result<ApplyOutcome, ModelError>,
    ) -> Result<ApplyOutcome, EditError>;

    /// Publish the working copy.
    fn save(&mut self) -> Result<(), EditError>;

    /// Drop the edit lock and any unsaved changes.
    fn release(&mut self);

    /// The last published model.
    fn snapshot(&self) -> FeatureModel;

    /// Ask a human to edit `constraint`.
    fn open_constraint_editor(&mut self, constraint: &Constraint) {
        debug!("open_constraint_editor({}): no interactive editor attached", constraint.name());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    Saved { revision: u64 },
    ConstraintEditRequested { constraint: ConstraintId, name: String },
}

/// A [`ModelEditor`] holding the model in memory.
///
/// Observers registered with [`InMemoryEditor::subscribe`] receive a
/// [`ModelEvent`] for every save and every manual-edit request.
#[derive(Debug)]
pub struct InMemoryEditor {
    published: FeatureModel,
    working: Option<FeatureModel>,
    revision: u64,
    listeners: Vec<Sender<ModelEvent>>,
}

impl InMemoryEditor {
    pub fn new(model: FeatureModel) -> Self {
        Self {
            published: model,
            working: None,
            revision: 0,
            listeners: Vec::new(),
        }
    }

    pub fn model(&self) -> &FeatureModel {
        &self.published
    }

    pub fn into_model(self) -> FeatureModel {
        self.published
    }

    /// Number of saves so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_editing(&self) -> bool {
        self.working.is_some()
    }

    pub fn subscribe(&mut self) -> Receiver<ModelEvent> {
        let (tx, rx) = channel();
        self.listeners.push(tx);
        rx
    }

    fn publish(&mut self, event: ModelEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl ModelEditor for InMemoryEditor {
    fn begin_edit(&mut self) -> Result<(), EditError> {
        if self.working.is_some() {
            warn!("begin_edit: model is locked by another edit");
            return Err(EditError::Busy);
        }
        self.working = Some(self.published.clone());
        Ok(())
    }

    fn mutate(
        &mut self,
        edit: &mut dyn FnMut(&mut FeatureModel) -> Result<ApplyOutcome, ModelError>,
    ) -> Result<ApplyOutcome, EditError> {
        let working = self.working.as_mut().ok_or(EditError::NotEditing)?;
        Ok(edit(working)?)
    }

    fn save(&mut self) -> Result<(), EditError> {
        let working = self.working.as_ref().ok_or(EditError::NotEditing)?;
        self.published = working.clone();
        self.revision += 1;
        debug!("save: revision {}", self.revision);
        self.publish(ModelEvent::Saved {
            revision: self.revision,
        });
        Ok(())
    }

    fn release(&mut self) {
        self.working = None;
    }

    fn snapshot(&self) -> FeatureModel {
        self.published.clone()
    }

    fn open_constraint_editor(&mut self, constraint: &Constraint) {
        debug!("open_constraint_editor({})", constraint.name());
        self.publish(ModelEvent::ConstraintEditRequested {
            constraint: constraint.id(),
            name: constraint.name().to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::formula::Formula;

    #[test]
    fn test_lock() {
        let mut editor = InMemoryEditor::new(FeatureModel::new("Root"));
        editor.begin_edit().unwrap();
        assert_eq!(editor.begin_edit(), Err(EditError::Busy));
        editor.release();
        assert!(editor.begin_edit().is_ok());
        editor.release();
        assert_eq!(editor.save(), Err(EditError::NotEditing));
    }

    #[test]
    fn test_release_discards_unsaved() {
        let mut editor = InMemoryEditor::new(FeatureModel::new("Root"));
        editor.begin_edit().unwrap();
        editor
            .mutate(&mut |model| {
                model.add_feature("Root", "A")?;
                Ok(ApplyOutcome::Applied)
            })
            .unwrap();
        editor.release();
        assert!(!editor.model().contains_feature("A"));
        assert_eq!(editor.revision(), 0);
    }

    #[test]
    fn test_events() {
        let mut editor = InMemoryEditor::new(FeatureModel::new("Root"));
        let rx = editor.subscribe();
        let dropped = editor.subscribe();
        drop(dropped);

        editor.begin_edit().unwrap();
        editor
            .mutate(&mut |model| {
                model.add_constraint(Formula::var("Root"));
                Ok(ApplyOutcome::Applied)
            })
            .unwrap();
        editor.save().unwrap();
        editor.release();
        assert_eq!(rx.try_recv(), Ok(ModelEvent::Saved { revision: 1 }));

        let snapshot = editor.snapshot();
        let constraint = &snapshot.constraints()[0];
        editor.open_constraint_editor(constraint);
        assert_eq!(
            rx.try_recv(),
            Ok(ModelEvent::ConstraintEditRequested {
                constraint: constraint.id(),
                name: "Root".to_string(),
            })
        );
        assert_eq!(editor.listeners.len(), 1);
    }

    #[test]
    fn test_mutate_error_is_wrapped() {
        let mut editor = InMemoryEditor::new(FeatureModel::new("Root"));
        editor.begin_edit().unwrap();
        let result = editor.mutate(&mut |model| {
            model.delete_feature("Root")?;
            Ok(ApplyOutcome::Applied)
        });
        assert_eq!(result, Err(EditError::Model(ModelError::CannotRemoveRoot("Root".into()))));
        editor.release();
    }
}

//! Undo/Redo system for annotation operations.
//!
//! This module implements the Command pattern: each undoable action is
//! recorded as a [`Command`] carrying enough state to apply its exact
//! inverse. Mutations are never re-derived from surrounding state, so undo
//! followed by redo reproduces coordinates bit-for-bit.

use crate::model::{Annotation, AnnotationId, AnnotationOrigin, BoundingBox};
use crate::store::AnnotationStore;

// ============================================================================
// Command Types
// ============================================================================

/// A command that can be undone and redone.
/// Each command stores enough information to reverse its effect.
#[derive(Debug, Clone)]
pub enum Command {
    /// Add an annotation
    AddBox {
        /// The annotation that was added
        annotation: Annotation,
    },
    /// Remove an annotation
    RemoveBox {
        /// The annotation that was removed (stored for undo)
        annotation: Annotation,
    },
    /// Modify an annotation's bounding box
    ModifyBox {
        /// The annotation ID
        annotation_id: AnnotationId,
        /// The box before modification
        old_box: BoundingBox,
        /// The box after modification
        new_box: BoundingBox,
    },
    /// Change an annotation's origin tag (review decisions)
    SetOrigin {
        /// The annotation ID
        annotation_id: AnnotationId,
        /// The origin before the change
        old_origin: AnnotationOrigin,
        /// The origin after the change
        new_origin: AnnotationOrigin,
    },
    /// Batch command - groups multiple commands into one undo step
    Batch {
        /// Description of the batch operation
        description: String,
        /// The commands in this batch
        commands: Vec<Command>,
    },
}

impl Command {
    /// Get a human-readable description of this command
    pub fn description(&self) -> String {
        match self {
            Command::AddBox { .. } => "Add box".to_string(),
            Command::RemoveBox { .. } => "Delete box".to_string(),
            Command::ModifyBox { .. } => "Move/resize box".to_string(),
            Command::SetOrigin { new_origin, .. } => match new_origin {
                AnnotationOrigin::Accepted => "Accept detection".to_string(),
                AnnotationOrigin::Manual => "Mark manual".to_string(),
                AnnotationOrigin::Proposed => "Mark proposed".to_string(),
            },
            Command::Batch { description, .. } => description.clone(),
        }
    }
}

// ============================================================================
// Undo Stack
// ============================================================================

/// Configuration for the undo stack
#[derive(Debug, Clone)]
pub struct UndoConfig {
    /// Maximum number of commands to keep in history
    pub max_history: usize,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self { max_history: 100 }
    }
}

/// The undo/redo history stack.
///
/// Maintains two stacks:
/// - `undo_stack`: Commands that can be undone (most recent at the end)
/// - `redo_stack`: Commands that can be redone (most recent at the end)
///
/// When a new command is recorded, it's pushed to undo_stack and redo_stack
/// is cleared. Undo moves the command from undo_stack to redo_stack; redo
/// moves it back.
#[derive(Debug, Clone, Default)]
pub struct UndoStack {
    /// Stack of commands that can be undone
    undo_stack: Vec<Command>,
    /// Stack of commands that can be redone
    redo_stack: Vec<Command>,
    /// Configuration
    config: UndoConfig,
}

impl UndoStack {
    /// Create a new empty undo stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration
    pub fn with_config(config: UndoConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Push a command to the undo stack.
    /// This clears the redo stack (can't redo after a new action).
    pub fn push(&mut self, command: Command) {
        log::debug!("📝 Undo: pushed '{}'", command.description());
        self.undo_stack.push(command);
        self.redo_stack.clear();

        // Limit history size
        while self.undo_stack.len() > self.config.max_history {
            self.undo_stack.remove(0);
        }
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Pop a command from the undo stack for undoing.
    /// The command is moved to the redo stack.
    /// Returns the command to undo, or None if stack is empty.
    pub fn pop_undo(&mut self) -> Option<Command> {
        let cmd = self.undo_stack.pop()?;
        log::debug!("⏪ Undo: '{}'", cmd.description());
        self.redo_stack.push(cmd.clone());
        Some(cmd)
    }

    /// Pop a command from the redo stack for redoing.
    /// The command is moved back to the undo stack.
    /// Returns the command to redo, or None if stack is empty.
    pub fn pop_redo(&mut self) -> Option<Command> {
        let cmd = self.redo_stack.pop()?;
        log::debug!("⏩ Redo: '{}'", cmd.description());
        self.undo_stack.push(cmd.clone());
        Some(cmd)
    }

    /// Get the description of the command that would be undone
    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.last().map(|c| c.description())
    }

    /// Get the description of the command that would be redone
    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.last().map(|c| c.description())
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        log::debug!("🗑️ Undo history cleared");
    }

    /// Get the number of commands in undo history
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get the number of commands in redo history
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

// ============================================================================
// Undo/Redo Execution
// ============================================================================

/// Record a command for later undo.
/// The action itself must already be applied to the store; this only records
/// it. For redo, use `redo_command` instead.
pub fn record_command(stack: &mut UndoStack, command: Command) {
    stack.push(command);
}

/// Undo a command by reversing its effect on the annotation store.
/// Returns true if the undo was successful, false if there was nothing to undo.
pub fn undo_command(stack: &mut UndoStack, store: &mut AnnotationStore) -> bool {
    let Some(cmd) = stack.pop_undo() else {
        return false;
    };

    apply_undo(&cmd, store);
    true
}

/// Redo a command by re-applying its effect.
/// Returns true if the redo was successful, false if there was nothing to redo.
pub fn redo_command(stack: &mut UndoStack, store: &mut AnnotationStore) -> bool {
    let Some(cmd) = stack.pop_redo() else {
        return false;
    };

    apply_redo(&cmd, store);
    true
}

/// Apply the undo operation for a command
fn apply_undo(cmd: &Command, store: &mut AnnotationStore) {
    match cmd {
        Command::AddBox { annotation } => {
            // Undo add = remove
            store.remove(annotation.id);
            log::debug!("⏪ Undid add box {}", annotation.id);
        }
        Command::RemoveBox { annotation } => {
            // Undo remove = restore with the same ID
            store.restore(annotation.clone());
            log::debug!("⏪ Undid remove box {}", annotation.id);
        }
        Command::ModifyBox {
            annotation_id,
            old_box,
            ..
        } => {
            // Undo modify = restore old box
            match store.set_box(*annotation_id, *old_box) {
                Ok(_) => log::debug!("⏪ Undid box modification on {}", annotation_id),
                Err(e) => log::warn!("⏪ Undo of box {} failed: {}", annotation_id, e),
            }
        }
        Command::SetOrigin {
            annotation_id,
            old_origin,
            ..
        } => {
            // Undo review decision = restore old origin
            match store.set_origin(*annotation_id, *old_origin) {
                Ok(_) => log::debug!("⏪ Undid origin change on {}", annotation_id),
                Err(e) => log::warn!("⏪ Undo of origin on {} failed: {}", annotation_id, e),
            }
        }
        Command::Batch { commands, .. } => {
            // Undo batch in reverse order
            for cmd in commands.iter().rev() {
                apply_undo(cmd, store);
            }
        }
    }
}

/// Apply the redo operation for a command
fn apply_redo(cmd: &Command, store: &mut AnnotationStore) {
    match cmd {
        Command::AddBox { annotation } => {
            // Redo add = restore the exact annotation
            store.restore(annotation.clone());
            log::debug!("⏩ Redid add box {}", annotation.id);
        }
        Command::RemoveBox { annotation } => {
            // Redo remove = remove again
            store.remove(annotation.id);
            log::debug!("⏩ Redid remove box {}", annotation.id);
        }
        Command::ModifyBox {
            annotation_id,
            new_box,
            ..
        } => {
            // Redo modify = apply new box
            match store.set_box(*annotation_id, *new_box) {
                Ok(_) => log::debug!("⏩ Redid box modification on {}", annotation_id),
                Err(e) => log::warn!("⏩ Redo of box {} failed: {}", annotation_id, e),
            }
        }
        Command::SetOrigin {
            annotation_id,
            new_origin,
            ..
        } => {
            // Redo review decision = apply new origin
            match store.set_origin(*annotation_id, *new_origin) {
                Ok(_) => log::debug!("⏩ Redid origin change on {}", annotation_id),
                Err(e) => log::warn!("⏩ Redo of origin on {} failed: {}", annotation_id, e),
            }
        }
        Command::Batch { commands, .. } => {
            // Redo batch in forward order
            for cmd in commands {
                apply_redo(cmd, store);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

use std::time::Instant;

use cvlab_core::Picture;

use crate::controls::{ParamSet, RawValue};
use crate::ops::OperatorSpec;
use crate::shell::Shell;
use crate::throttle::Throttle;
use crate::{Result, StudioError, PREVIEW_THROTTLE};

/// What a control change did besides storing the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// A preview recompute ran and the display shows the new result.
    Previewed,
    /// Only the control's value label should update: live preview is off or
    /// the change landed inside the throttle window and was dropped.
    LabelOnly,
}

/// One open parameter-editing session: a frozen snapshot of the source
/// image, the operator's current parameters, and the preview throttle.
///
/// The session talks to the [`Shell`] per call instead of holding it, so
/// several panels can be open against the same shell. Every exit path
/// (`commit`, `cancel`, `close`) deregisters the panel title.
#[derive(Debug)]
pub struct PanelSession {
    op: &'static OperatorSpec,
    revert_target: Picture,
    params: ParamSet,
    live_preview: bool,
    throttle: Throttle,
}

impl PanelSession {
    pub(crate) fn new(op: &'static OperatorSpec, revert_target: Picture) -> Self {
        Self {
            op,
            revert_target,
            params: ParamSet::from_specs(op.controls),
            live_preview: true,
            throttle: Throttle::new(PREVIEW_THROTTLE),
        }
    }

    pub fn title(&self) -> &'static str {
        self.op.name
    }

    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    pub fn revert_target(&self) -> &Picture {
        &self.revert_target
    }

    pub fn live_preview(&self) -> bool {
        self.live_preview
    }

    pub fn set_live_preview(&mut self, on: bool) {
        self.live_preview = on;
    }

    /// A control moved. The raw value is normalized and stored immediately;
    /// whether a preview recompute follows depends on the live-preview
    /// toggle and the throttle window. Dropped recomputes are not queued:
    /// the stored parameters simply wait for the next event or for commit.
    pub fn control_changed(
        &mut self,
        shell: &mut Shell,
        id: &str,
        raw: RawValue,
        now: Instant,
    ) -> Result<ChangeOutcome> {
        if self.params.set_raw(id, raw).is_none() {
            return Err(StudioError::UnknownControl {
                panel: self.op.name.to_string(),
                control: id.to_string(),
            });
        }

        if !self.live_preview || !self.throttle.try_fire(now) {
            return Ok(ChangeOutcome::LabelOnly);
        }

        self.recompute(shell, true)?;
        Ok(ChangeOutcome::Previewed)
    }

    /// Applies the operator to a copy of the revert target with the current
    /// parameters. The preview path leaves the editor state untouched; the
    /// commit path records the result as current output.
    pub fn recompute(&self, shell: &mut Shell, preview_only: bool) -> Result<()> {
        let result = (self.op.apply)(&self.revert_target, &self.params)?;
        if preview_only {
            shell.preview_image(&result);
        } else {
            shell.display_image(result);
        }
        Ok(())
    }

    /// OK: recompute with the *current* parameters (the throttle never
    /// applies here), commit the result, close the panel.
    pub fn commit(self, shell: &mut Shell) -> Result<()> {
        let outcome = self.recompute(shell, false);
        shell.release_panel(self.op.name);
        if outcome.is_ok() {
            tracing::info!(panel = self.op.name, "committed");
        }
        outcome
    }

    /// Restores the display to the revert-target snapshot and resets the
    /// parameters to their defaults. The panel stays open; the caller
    /// re-syncs its controls from [`PanelSession::control_positions`].
    pub fn revert(&mut self, shell: &mut Shell) {
        shell.preview_image(&self.revert_target);
        self.params.reset();
        self.throttle.reset();
    }

    /// Cancel: revert, then close.
    pub fn cancel(mut self, shell: &mut Shell) {
        self.revert(shell);
        shell.release_panel(self.op.name);
    }

    /// Close without touching the display (window-manager close).
    pub fn close(self, shell: &mut Shell) {
        shell.release_panel(self.op.name);
    }

    /// Raw control positions matching the current parameters, for pushing
    /// state back into UI widgets after a revert.
    pub fn control_positions(&self) -> Vec<(&'static str, RawValue)> {
        self.params.raw_values()
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Capture session graph model
//!
//! A [`CaptureSession`] records which inputs and outputs are attached and the
//! per-output connection settings. Structural changes only happen through a
//! [`Transaction`], which commits when it goes out of scope, on success and
//! on early return alike.

use crate::backends::camera::{SessionId, SessionPreset};
use tracing::debug;

/// Kind of input a session accepts, at most one of each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Video,
    Audio,
}

/// Kind of output a session produces, at most one of each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Photo,
    MovieFile,
    AudioData,
}

impl OutputKind {
    /// Outputs that carry video and therefore get a video connection
    fn carries_video(&self) -> bool {
        matches!(self, OutputKind::Photo | OutputKind::MovieFile)
    }
}

/// An attached input and the device it reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInput {
    pub kind: InputKind,
    pub device_id: String,
}

impl SessionInput {
    pub fn new(kind: InputKind, device_id: impl Into<String>) -> Self {
        Self {
            kind,
            device_id: device_id.into(),
        }
    }
}

/// Video connection between the video input and an output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connection {
    pub video_rotation_angle: f64,
    pub stabilization_enabled: bool,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            video_rotation_angle: 0.0,
            stabilization_enabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct OutputSlot {
    kind: OutputKind,
    connection: Connection,
}

/// One structural change applied inside a transaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransactionOp {
    SetPreset(SessionPreset),
    AddInput(InputKind),
    RemoveInput(InputKind),
    AddOutput(OutputKind),
    RemoveOutput(OutputKind),
}

/// The capture graph: inputs, outputs, preset and running flag
#[derive(Debug)]
pub struct CaptureSession {
    id: SessionId,
    preset: SessionPreset,
    inputs: Vec<SessionInput>,
    outputs: Vec<OutputSlot>,
    running: bool,
    configuring: bool,
    commits: u64,
    last_commit: Vec<TransactionOp>,
}

impl CaptureSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            preset: SessionPreset::Photo,
            inputs: Vec::new(),
            outputs: Vec::new(),
            running: false,
            configuring: false,
            commits: 0,
            last_commit: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Open a configuration transaction; it commits when dropped
    pub fn begin_configuration(&mut self) -> Transaction<'_> {
        debug_assert!(!self.configuring, "nested configuration transaction");
        self.configuring = true;
        Transaction {
            session: self,
            ops: Vec::new(),
        }
    }

    pub fn preset(&self) -> SessionPreset {
        self.preset
    }

    pub fn input(&self, kind: InputKind) -> Option<&SessionInput> {
        self.inputs.iter().find(|input| input.kind == kind)
    }

    pub fn has_input(&self, kind: InputKind) -> bool {
        self.input(kind).is_some()
    }

    pub fn has_output(&self, kind: OutputKind) -> bool {
        self.outputs.iter().any(|slot| slot.kind == kind)
    }

    pub fn input_kinds(&self) -> Vec<InputKind> {
        self.inputs.iter().map(|input| input.kind).collect()
    }

    pub fn output_kinds(&self) -> Vec<OutputKind> {
        self.outputs.iter().map(|slot| slot.kind).collect()
    }

    /// Video connection of `output`; exists only while a video input feeds it
    pub fn connection(&self, output: OutputKind) -> Option<Connection> {
        if !output.carries_video() || !self.has_input(InputKind::Video) {
            return None;
        }
        self.outputs
            .iter()
            .find(|slot| slot.kind == output)
            .map(|slot| slot.connection)
    }

    /// Connection settings can change outside a transaction
    pub fn connection_mut(&mut self, output: OutputKind) -> Option<&mut Connection> {
        if !output.carries_video() || !self.has_input(InputKind::Video) {
            return None;
        }
        self.outputs
            .iter_mut()
            .find(|slot| slot.kind == output)
            .map(|slot| &mut slot.connection)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn is_configuring(&self) -> bool {
        self.configuring
    }

    /// Number of committed transactions
    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Operations applied by the most recent commit
    pub fn last_commit(&self) -> &[TransactionOp] {
        &self.last_commit
    }
}

/// Open configuration transaction on a [`CaptureSession`]
pub struct Transaction<'a> {
    session: &'a mut CaptureSession,
    ops: Vec<TransactionOp>,
}

impl Transaction<'_> {
    pub fn session(&self) -> &CaptureSession {
        self.session
    }

    pub fn set_preset(&mut self, preset: SessionPreset) {
        if self.session.preset != preset {
            self.session.preset = preset;
            self.ops.push(TransactionOp::SetPreset(preset));
        }
    }

    pub fn can_add_input(&self, kind: InputKind) -> bool {
        !self.session.has_input(kind)
    }

    /// Attach `input`; false when the session refuses it
    pub fn add_input(&mut self, input: SessionInput) -> bool {
        if !self.can_add_input(input.kind) {
            return false;
        }
        self.ops.push(TransactionOp::AddInput(input.kind));
        self.session.inputs.push(input);
        true
    }

    /// Detach the input of `kind`, returning it if it was attached
    pub fn remove_input(&mut self, kind: InputKind) -> Option<SessionInput> {
        let index = self.session.inputs.iter().position(|i| i.kind == kind)?;
        self.ops.push(TransactionOp::RemoveInput(kind));
        Some(self.session.inputs.remove(index))
    }

    /// An output is accepted if absent, and the photo output never coexists
    /// with the movie-file output
    pub fn can_add_output(&self, kind: OutputKind) -> bool {
        let conflict = match kind {
            OutputKind::Photo => self.session.has_output(OutputKind::MovieFile),
            OutputKind::MovieFile => self.session.has_output(OutputKind::Photo),
            OutputKind::AudioData => false,
        };
        !conflict && !self.session.has_output(kind)
    }

    pub fn add_output(&mut self, kind: OutputKind) -> bool {
        if !self.can_add_output(kind) {
            return false;
        }
        self.ops.push(TransactionOp::AddOutput(kind));
        self.session.outputs.push(OutputSlot {
            kind,
            connection: Connection::default(),
        });
        true
    }

    pub fn remove_output(&mut self, kind: OutputKind) -> bool {
        let Some(index) = self.session.outputs.iter().position(|s| s.kind == kind) else {
            return false;
        };
        self.session.outputs.remove(index);
        self.ops.push(TransactionOp::RemoveOutput(kind));
        true
    }

    pub fn connection_mut(&mut self, output: OutputKind) -> Option<&mut Connection> {
        self.session.connection_mut(output)
    }

    /// Detach every input and output
    pub fn clear(&mut self) {
        for kind in self.session.output_kinds() {
            self.remove_output(kind);
        }
        for kind in self.session.input_kinds() {
            self.remove_input(kind);
        }
    }

    /// Commit now rather than at end of scope
    pub fn commit(self) {}
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.session.configuring = false;
        self.session.commits += 1;
        debug!(
            commit = self.session.commits,
            ops = ?self.ops,
            "Committed session configuration"
        );
        self.session.last_commit = std::mem::take(&mut self.ops);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CaptureSession {
        CaptureSession::new(SessionId::new())
    }

    #[test]
    fn test_transaction_commits_on_drop() {
        let mut session = session();
        {
            let mut tx = session.begin_configuration();
            assert!(tx.add_input(SessionInput::new(InputKind::Video, "cam")));
            assert!(tx.add_output(OutputKind::Photo));
            assert!(tx.session().is_configuring());
        }
        assert!(!session.is_configuring());
        assert_eq!(session.commits(), 1);
        assert_eq!(
            session.last_commit(),
            &[
                TransactionOp::AddInput(InputKind::Video),
                TransactionOp::AddOutput(OutputKind::Photo)
            ]
        );
    }

    #[test]
    fn test_transaction_commits_on_early_return() {
        fn configure(session: &mut CaptureSession) -> Result<(), &'static str> {
            let mut tx = session.begin_configuration();
            tx.add_input(SessionInput::new(InputKind::Video, "cam"));
            if !tx.session().has_input(InputKind::Audio) {
                return Err("microphone missing");
            }
            tx.add_output(OutputKind::MovieFile);
            Ok(())
        }

        let mut session = session();
        assert!(configure(&mut session).is_err());
        assert!(!session.is_configuring());
        assert!(session.has_input(InputKind::Video));
        assert!(!session.has_output(OutputKind::MovieFile));
    }

    #[test]
    fn test_photo_and_movie_outputs_are_exclusive() {
        let mut session = session();
        let mut tx = session.begin_configuration();
        assert!(tx.add_output(OutputKind::Photo));
        assert!(!tx.can_add_output(OutputKind::MovieFile));
        assert!(!tx.add_output(OutputKind::MovieFile));
        tx.remove_output(OutputKind::Photo);
        assert!(tx.add_output(OutputKind::MovieFile));
        assert!(!tx.add_output(OutputKind::MovieFile));
    }

    #[test]
    fn test_duplicate_input_rejected() {
        let mut session = session();
        let mut tx = session.begin_configuration();
        assert!(tx.add_input(SessionInput::new(InputKind::Audio, "mic")));
        assert!(!tx.add_input(SessionInput::new(InputKind::Audio, "mic")));
    }

    #[test]
    fn test_connection_requires_video_input() {
        let mut session = session();
        {
            let mut tx = session.begin_configuration();
            tx.add_output(OutputKind::Photo);
        }
        assert!(session.connection(OutputKind::Photo).is_none());
        {
            let mut tx = session.begin_configuration();
            tx.add_input(SessionInput::new(InputKind::Video, "cam"));
        }
        let connection = session.connection_mut(OutputKind::Photo).unwrap();
        connection.video_rotation_angle = 90.0;
        assert_eq!(
            session.connection(OutputKind::Photo).unwrap().video_rotation_angle,
            90.0
        );
        assert!(session.connection(OutputKind::AudioData).is_none());
    }

    #[test]
    fn test_clear_detaches_everything() {
        let mut session = session();
        {
            let mut tx = session.begin_configuration();
            tx.add_input(SessionInput::new(InputKind::Video, "cam"));
            tx.add_input(SessionInput::new(InputKind::Audio, "mic"));
            tx.add_output(OutputKind::MovieFile);
            tx.add_output(OutputKind::AudioData);
        }
        session.begin_configuration().clear();
        assert!(session.input_kinds().is_empty());
        assert!(session.output_kinds().is_empty());
        assert_eq!(session.commits(), 2);
    }
}

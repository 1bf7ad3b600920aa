//! Scripted in-memory device for session tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::TransportError;
use crate::transport::Transport;

/// What the session sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Input {
    /// A line, without its line ending.
    Line(String),
    /// Bytes sent without a line ending.
    Raw(String),
}

impl Input {
    pub(crate) fn line(text: &str) -> Self {
        Self::Line(text.to_string())
    }

    pub(crate) fn raw(text: &str) -> Self {
        Self::Raw(text.to_string())
    }
}

/// The device's reaction to one input.
pub(crate) enum Reply {
    Send(String),
    Silent,
    Close,
}

type Responder = Box<dyn FnMut(&Input) -> Reply + Send>;

/// Transport backed by a responder closure.
pub(crate) struct FakeDevice {
    responder: Responder,
    pending: VecDeque<Vec<u8>>,
    inputs: Arc<Mutex<Vec<Input>>>,
    closed: bool,
}

impl FakeDevice {
    /// A device that prints `greeting` and answers through `responder`.
    pub(crate) fn new(
        greeting: &str,
        responder: impl FnMut(&Input) -> Reply + Send + 'static,
    ) -> (Self, Arc<Mutex<Vec<Input>>>) {
        let inputs = Arc::new(Mutex::new(Vec::new()));
        let mut pending = VecDeque::new();
        if !greeting.is_empty() {
            pending.push_back(greeting.as_bytes().to_vec());
        }
        let device = Self {
            responder: Box::new(responder),
            pending,
            inputs: inputs.clone(),
            closed: false,
        };
        (device, inputs)
    }
}

impl Transport for FakeDevice {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Disconnected);
        }
        let text = String::from_utf8_lossy(data);
        let input = match text.strip_suffix('\n') {
            Some(line) => Input::Line(line.to_string()),
            None => Input::Raw(text.into_owned()),
        };
        let reply = (self.responder)(&input);
        self.inputs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(input);
        match reply {
            Reply::Send(output) => self.pending.push_back(output.into_bytes()),
            Reply::Silent => {}
            Reply::Close => self.closed = true,
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if let Some(chunk) = self.pending.pop_front() {
            return Ok(Some(chunk));
        }
        if self.closed {
            return Ok(None);
        }
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}

/// Echo `command`, print `body`, then the prompt.
pub(crate) fn respond(command: &str, body: &str, prompt: &str) -> Reply {
    Reply::Send(format!("{command}\r\n{body}\r\n{prompt}"))
}

/// A device that answers every line with its echo and `prompt`, and
/// ignores raw input.
pub(crate) fn echo_device(prompt: &'static str) -> impl FnMut(&Input) -> Reply + Send + 'static {
    move |input| match input {
        Input::Line(line) => Reply::Send(format!("{line}\r\n{prompt}")),
        Input::Raw(_) => Reply::Silent,
    }
}

/// Lock and copy the recorded inputs.
pub(crate) fn inputs(log: &Arc<Mutex<Vec<Input>>>) -> Vec<Input> {
    log.lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone()
}

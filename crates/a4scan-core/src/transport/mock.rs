//! Scripted mock channel for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::traits::DuplexChannel;
use crate::error::ErrorCode;

#[derive(Default)]
struct MockChannelState {
    connected: bool,
    reads: VecDeque<Result<Vec<u8>, ErrorCode>>,
    writes: Vec<Vec<u8>>,
    connect_error: Option<ErrorCode>,
}

/// A channel whose reads are scripted ahead of time and whose writes are
/// captured for inspection. State is shared across clones so a test can
/// keep a handle while the channel is owned elsewhere.
#[derive(Clone, Default)]
pub struct MockChannel {
    state: Arc<Mutex<MockChannelState>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful read returning `data`.
    pub fn push_read(&self, data: Vec<u8>) {
        self.state.lock().unwrap().reads.push_back(Ok(data));
    }

    /// Queues a failed read.
    pub fn push_read_error(&self, error: ErrorCode) {
        self.state.lock().unwrap().reads.push_back(Err(error));
    }

    /// Makes the next `connect()` fail.
    pub fn fail_connect(&self, error: ErrorCode) {
        self.state.lock().unwrap().connect_error = Some(error);
    }

    /// All buffers written so far, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }
}

impl DuplexChannel for MockChannel {
    fn connect(&mut self) -> Result<(), ErrorCode> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.connect_error.take() {
            return Err(error);
        }
        state.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.state.lock().unwrap().connected = false;
    }

    fn read(&mut self, max_length: usize) -> Result<Vec<u8>, ErrorCode> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(ErrorCode::DeviceNotOpened);
        }
        match state.reads.pop_front() {
            Some(Ok(mut data)) => {
                data.truncate(max_length);
                Ok(data)
            }
            Some(Err(error)) => Err(error),
            None => Err(ErrorCode::NoDeviceAnswer),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), ErrorCode> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(ErrorCode::DeviceNotOpened);
        }
        state.writes.push(data.to_vec());
        Ok(())
    }
}

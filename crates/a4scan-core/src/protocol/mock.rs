//! Protocol-level mock channel.
//!
//! Parses each written request and lets a responder decide what the
//! device answers. Replies are queued as discrete transfers; a read
//! returns at most one transfer, split when it exceeds the requested
//! length, which models how image data arrives in chunks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::messages::{AnyRequest, parse_request};
use crate::error::ErrorCode;
use crate::transport::DuplexChannel;

/// What the mocked device does with one parsed request.
pub enum ResponderAction {
    /// Queue one reply transfer.
    Reply(Vec<u8>),
    /// Queue several reply transfers.
    Replies(Vec<Vec<u8>>),
    /// Accept the request without replying.
    NoReply,
    /// Fail the write itself.
    Fail(ErrorCode),
}

type Responder = Box<dyn FnMut(&AnyRequest) -> ResponderAction + Send>;

struct MockProtocolState {
    connected: bool,
    pending: VecDeque<Vec<u8>>,
    requests: Vec<AnyRequest>,
    responder: Responder,
}

/// A duplex channel backed by a responder instead of hardware.
#[derive(Clone)]
pub struct MockProtocolChannel {
    state: Arc<Mutex<MockProtocolState>>,
}

impl MockProtocolChannel {
    pub fn new(responder: impl FnMut(&AnyRequest) -> ResponderAction + Send + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockProtocolState {
                connected: false,
                pending: VecDeque::new(),
                requests: Vec::new(),
                responder: Box::new(responder),
            })),
        }
    }

    /// Every request parsed so far, in order.
    pub fn requests(&self) -> Vec<AnyRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

impl DuplexChannel for MockProtocolChannel {
    fn connect(&mut self) -> Result<(), ErrorCode> {
        self.state.lock().unwrap().connected = true;
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
        match state.pending.pop_front() {
            Some(mut transfer) => {
                if transfer.len() > max_length {
                    let rest = transfer.split_off(max_length);
                    state.pending.push_front(rest);
                }
                Ok(transfer)
            }
            None => Err(ErrorCode::NoDeviceAnswer),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), ErrorCode> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(ErrorCode::DeviceNotOpened);
        }
        let request = parse_request(data).ok_or(ErrorCode::InvalidCommand)?;
        state.requests.push(request.clone());
        let action = (state.responder)(&request);
        match action {
            ResponderAction::Reply(reply) => state.pending.push_back(reply),
            ResponderAction::Replies(replies) => state.pending.extend(replies),
            ResponderAction::NoReply => {}
            ResponderAction::Fail(error) => return Err(error),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coder::Message;
    use crate::protocol::messages::AckResponse;
    use crate::protocol::{self};
    use crate::types::ScanSide;

    #[test]
    fn responder_sees_parsed_requests() {
        let mut channel = MockProtocolChannel::new(|request| match request {
            AnyRequest::JobCreate(_) => {
                ResponderAction::Reply(AckResponse { job_id: 1 }.encode().unwrap())
            }
            _ => ResponderAction::NoReply,
        });
        channel.connect().unwrap();
        assert_eq!(protocol::create_job(&mut channel).unwrap(), 1);
        assert_eq!(channel.requests().len(), 1);
    }

    #[test]
    fn oversized_transfers_are_split_across_reads() {
        let mut channel = MockProtocolChannel::new(|_| ResponderAction::Reply(vec![7u8; 10]));
        channel.connect().unwrap();
        let data = protocol::get_image_data(&mut channel, 10, ScanSide::A).unwrap();
        assert_eq!(data, vec![7u8; 10]);

        // A second pull for the same reply arrives in two chunks.
        let mut channel = MockProtocolChannel::new(|_| ResponderAction::Reply(vec![7u8; 10]));
        channel.connect().unwrap();
        let first = {
            use crate::protocol::messages::GetImageDataRequest;
            protocol::send_request(
                &mut channel,
                &GetImageDataRequest {
                    length: 10,
                    scan_side: ScanSide::A,
                },
            )
            .unwrap();
            channel.read(4).unwrap()
        };
        assert_eq!(first.len(), 4);
        assert_eq!(channel.read(100).unwrap().len(), 6);
    }

    #[test]
    fn multiple_replies_arrive_as_separate_transfers() {
        let mut channel = MockProtocolChannel::new(|_| {
            ResponderAction::Replies(vec![vec![1u8; 6], vec![2u8; 6]])
        });
        channel.connect().unwrap();
        let data = protocol::get_image_data(&mut channel, 12, ScanSide::B).unwrap();
        assert_eq!(&data[..6], &[1u8; 6]);
        assert_eq!(&data[6..], &[2u8; 6]);
    }

    #[test]
    fn injected_write_failures_surface_to_the_caller() {
        let mut channel =
            MockProtocolChannel::new(|_| ResponderAction::Fail(ErrorCode::WriteError));
        channel.connect().unwrap();
        assert_eq!(
            protocol::create_job(&mut channel),
            Err(ErrorCode::WriteError)
        );
        assert_eq!(channel.requests().len(), 1);
    }

    #[test]
    fn unparsable_writes_are_rejected() {
        let mut channel = MockProtocolChannel::new(|_| ResponderAction::NoReply);
        channel.connect().unwrap();
        assert_eq!(channel.write(b"junk"), Err(ErrorCode::InvalidCommand));
    }
}

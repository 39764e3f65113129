use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;

use skirmish::{ClientConfig, ClientHandle, ClientIntent, ClientReactor, EntitySnapshot, SnapshotBuffer};

/// One connection attempt: a reactor thread plus the buffer it fills.
/// Reconnecting replaces the whole session, buffer included.
pub struct Session {
    handle: ClientHandle,
    buffer: Arc<SnapshotBuffer>,
    thread: Option<JoinHandle<()>>,
}

impl Session {
    pub fn start(config: ClientConfig) -> io::Result<Self> {
        let buffer = Arc::new(SnapshotBuffer::default());
        let (handle, thread) = ClientReactor::spawn(config, Arc::clone(&buffer))?;

        Ok(Self {
            handle,
            buffer,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> &ClientHandle {
        &self.handle
    }

    pub fn send_input(&self, intent: ClientIntent) {
        self.handle.send_input(intent);
    }

    pub fn sample(&self) -> HashMap<u32, EntitySnapshot> {
        self.buffer.sample_now()
    }

    /// Own player's health from the newest keyframe.
    pub fn own_health(&self) -> Option<u32> {
        let id = self.handle.own_id()?;
        self.buffer.latest()?.entity(id)?.health()
    }

    pub fn stop(&mut self) {
        self.handle.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("Network thread panicked");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Embedded command-execution adapter: drives a command processor without
//! any real socket, capturing the reply directly from an internal buffer
//! instead of writing to an fd.
//!
//! Grounded on `original_source/src/eredis.c`: a pseudo-client with sentinel
//! fd -1, an argv builder that releases the previous argv before building a
//! new one, and a reply-chunk iterator that returns the inline buffer first
//! and then walks an overflow list one node at a time. This crate carries no
//! `client`/`server` globals, so the adapter is generic over a small
//! [`CommandProcessor`] trait instead of hardcoding Redis's dispatcher.

use crate::error::{Error, Result};

/// Sentinel fd used by an embedded client, matching the original's `-1`
/// pseudo-fd that tells the dispatcher "no real socket, write into
/// `reply_buffer` instead."
pub const SENTINEL_FD: i32 = -1;

/// The dispatcher an embedded client drives. A real host implements this
/// over its actual command table; tests use a small PING/ECHO toy.
pub trait CommandProcessor {
    /// Execute one command given as an argv of byte strings. `Err(())`
    /// matches the original's bare-OK/ERR dispatcher return, since this
    /// adapter doesn't interpret the processor's own error taxonomy.
    fn execute(&mut self, argv: &[Vec<u8>]) -> std::result::Result<(), ()>;

    /// Drain whatever the last `execute` wrote, as the chunk sequence
    /// `read_reply_chunk` will iterate: inline buffer first, then overflow
    /// chunks, in order.
    fn take_reply_chunks(&mut self) -> Vec<Vec<u8>>;
}

/// One embedded client: its pending argv and the reply chunks produced by
/// the last `execute`, consumed one at a time by `read_reply_chunk`.
pub struct EmbeddedClient<P: CommandProcessor> {
    processor: P,
    argv: Vec<Vec<u8>>,
    reply_chunks: std::collections::VecDeque<Vec<u8>>,
}

/// `init()`: process-wide, call-once setup. This crate has no global
/// server/module state of its own to initialize (Non-goal: no protocol
/// parsing, no module loading), so this is a marker the host calls once
/// before creating any embedded clients, matching the original's
/// "exactly once per process" contract without carrying its TCP/unix
/// socket/module-loading side effects.
pub fn init() -> Result<()> {
    tracing::info!("embedded adapter initialized");
    Ok(())
}

/// `create_client()`: allocate an embedded-client record wrapping the given
/// processor, with sentinel fd -1 and module-reply semantics implicit in
/// `take_reply_chunks` writing to an internal buffer rather than a socket.
pub fn create_client<P: CommandProcessor>(processor: P) -> EmbeddedClient<P> {
    EmbeddedClient {
        processor,
        argv: Vec::new(),
        reply_chunks: std::collections::VecDeque::new(),
    }
}

impl<P: CommandProcessor> EmbeddedClient<P> {
    /// `prepare_request`: releases the previous argv, builds a new one from
    /// the given byte slices, and resets the reply cursor (any
    /// not-yet-consumed chunks from a prior `execute` are discarded).
    pub fn prepare_request(&mut self, args: &[&[u8]]) {
        self.argv = args.iter().map(|a| a.to_vec()).collect();
        self.reply_chunks.clear();
    }

    /// `execute`: invokes the dispatcher; `Ok(())` iff it returned OK.
    pub fn execute(&mut self) -> Result<()> {
        self.processor
            .execute(&self.argv)
            .map_err(|_| Error::embedded("command processor returned an error"))?;
        for chunk in self.processor.take_reply_chunks() {
            self.reply_chunks.push_back(chunk);
        }
        Ok(())
    }

    /// `read_reply_chunk`: the inline buffer first, then the overflow list,
    /// one chunk per call; `None` once exhausted. Callers must not assume
    /// one chunk per logical reply element — only that concatenating every
    /// chunk reproduces the full reply.
    pub fn read_reply_chunk(&mut self) -> Option<Vec<u8>> {
        self.reply_chunks.pop_front()
    }

    pub fn fd(&self) -> i32 {
        SENTINEL_FD
    }
}

/// `free_client`: in Rust this is just dropping the `EmbeddedClient` value;
/// kept as an explicit function so callers porting the original's explicit
/// free-then-null-out-pointer idiom have a direct equivalent.
pub fn free_client<P: CommandProcessor>(_client: EmbeddedClient<P>) {}

/// A toy PING/ECHO dispatcher used to exercise the adapter in tests without
/// a real command table: replies with a RESP simple-string `+PONG\r\n` for
/// `PING`, or a RESP bulk string echoing the first argument for `ECHO`.
#[cfg(test)]
pub struct PingEchoProcessor {
    pending: Vec<Vec<u8>>,
}

#[cfg(test)]
impl PingEchoProcessor {
    pub fn new() -> Self {
        Self { pending: Vec::new() }
    }
}

#[cfg(test)]
impl CommandProcessor for PingEchoProcessor {
    fn execute(&mut self, argv: &[Vec<u8>]) -> std::result::Result<(), ()> {
        let Some(cmd) = argv.first() else { return Err(()) };
        match cmd.to_ascii_uppercase().as_slice() {
            b"PING" => {
                self.pending.push(b"+PONG\r\n".to_vec());
                Ok(())
            }
            b"ECHO" => {
                let arg = argv.get(1).cloned().unwrap_or_default();
                self.pending.push(format!("${}\r\n", arg.len()).into_bytes());
                self.pending.push(arg);
                self.pending.push(b"\r\n".to_vec());
                Ok(())
            }
            _ => Err(()),
        }
    }

    fn take_reply_chunks(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_ping_round_trip() {
        init().unwrap();
        let mut client = create_client(PingEchoProcessor::new());
        assert_eq!(client.fd(), SENTINEL_FD);

        client.prepare_request(&[b"PING"]);
        client.execute().unwrap();

        let mut reassembled = Vec::new();
        while let Some(chunk) = client.read_reply_chunk() {
            reassembled.extend(chunk);
        }
        assert_eq!(reassembled, b"+PONG\r\n");
        assert!(client.read_reply_chunk().is_none());

        free_client(client);
    }

    #[test]
    fn embedded_echo_concatenates_to_full_reply() {
        let mut client = create_client(PingEchoProcessor::new());
        client.prepare_request(&[b"ECHO", b"hello"]);
        client.execute().unwrap();

        let mut reassembled = Vec::new();
        while let Some(chunk) = client.read_reply_chunk() {
            reassembled.extend(chunk);
        }
        assert_eq!(reassembled, b"$5\r\nhello\r\n");
    }

    #[test]
    fn prepare_request_resets_unread_chunks_from_prior_execute() {
        let mut client = create_client(PingEchoProcessor::new());
        client.prepare_request(&[b"PING"]);
        client.execute().unwrap();
        // Don't drain the reply — a new request must still reset the cursor.
        client.prepare_request(&[b"PING"]);
        assert_eq!(client.reply_chunks.len(), 0);
        client.execute().unwrap();
        assert_eq!(client.read_reply_chunk(), Some(b"+PONG\r\n".to_vec()));
    }

    #[test]
    fn unknown_command_is_an_error() {
        let mut client = create_client(PingEchoProcessor::new());
        client.prepare_request(&[b"NOPE"]);
        assert!(client.execute().is_err());
    }
}

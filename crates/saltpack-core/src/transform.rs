//! Push-based byte transforms and their composition
//!
//! Every streaming encoder and decoder in the workspace is a [`Transform`]: the caller
//! pushes arbitrarily-sized input with [`Transform::update`] and signals end of input
//! with [`Transform::finish`]. Each call returns whatever output became available.
//!
//! ```text
//! input ──update──▶ [first] ──▶ [second] ──▶ output
//!         finish            (Pipe drives both)
//! ```

use std::io::{Read, Write};

use crate::error::{SaltpackError, SaltpackResult};

/// Size of the read buffer used by [`copy`]
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// An incremental byte-to-byte transformation.
///
/// Implementations must accept any chunking of the input and produce output whose
/// concatenation doesn't depend on that chunking. An implementation that returned an
/// error must keep failing on every later call.
pub trait Transform {
    /// Push more input; returns output that is ready to be released.
    fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>>;

    /// Signal end of input; returns the remaining output.
    fn finish(&mut self) -> SaltpackResult<Vec<u8>>;
}

impl<T: Transform + ?Sized> Transform for Box<T> {
    fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
        (**self).update(input)
    }

    fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
        (**self).finish()
    }
}

/// Lifecycle bookkeeping shared by stream implementations.
///
/// A failure is sticky: once a call has returned an error every later call fails with
/// [`SaltpackError::StreamFailed`]. Calls after a successful finish fail the same way.
#[derive(Debug, Default)]
pub struct StreamGuard {
    failure: Option<String>,
    finished: bool,
}

impl StreamGuard {
    pub fn check(&self) -> SaltpackResult<()> {
        if let Some(failure) = &self.failure {
            return Err(SaltpackError::StreamFailed(failure.clone()));
        }
        if self.finished {
            return Err(SaltpackError::StreamFailed("stream already finished".into()));
        }
        Ok(())
    }

    pub fn record<T>(&mut self, result: SaltpackResult<T>) -> SaltpackResult<T> {
        if let Err(e) = &result {
            tracing::debug!(error = %e, "stream failed");
            self.failure = Some(e.to_string());
        }
        result
    }

    pub fn mark_finished(&mut self) {
        self.finished = true;
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Two transforms chained together: output of `first` is fed into `second`.
#[derive(Debug)]
pub struct Pipe<A, B> {
    first: A,
    second: B,
}

impl<A: Transform, B: Transform> Pipe<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    pub fn first(&self) -> &A {
        &self.first
    }

    pub fn second(&self) -> &B {
        &self.second
    }

    pub fn into_inner(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: Transform, B: Transform> Transform for Pipe<A, B> {
    fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
        let middle = self.first.update(input)?;
        if middle.is_empty() {
            return Ok(Vec::new());
        }
        self.second.update(&middle)
    }

    fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
        let middle = self.first.finish()?;
        let mut out = self.second.update(&middle)?;
        out.extend(self.second.finish()?);
        Ok(out)
    }
}

/// Run a transform over a complete buffer.
pub fn run<T: Transform + ?Sized>(transform: &mut T, input: &[u8]) -> SaltpackResult<Vec<u8>> {
    let mut out = transform.update(input)?;
    out.extend(transform.finish()?);
    Ok(out)
}

/// Stream everything from `reader` through `transform` into `writer`.
///
/// Returns the number of bytes written.
pub fn copy<T, R, W>(transform: &mut T, reader: &mut R, writer: &mut W) -> SaltpackResult<u64>
where
    T: Transform + ?Sized,
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        let out = transform.update(&buf[..n])?;
        writer.write_all(&out)?;
        written += out.len() as u64;
    }

    let out = transform.finish()?;
    writer.write_all(&out)?;
    writer.flush()?;
    written += out.len() as u64;

    tracing::debug!(bytes = written, "transform finished");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Upper-cases input, emitting only complete 4-byte groups until finish.
    #[derive(Default)]
    struct Groups {
        pending: Vec<u8>,
    }

    impl Transform for Groups {
        fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
            self.pending.extend_from_slice(input);
            let ready = self.pending.len() / 4 * 4;
            Ok(self
                .pending
                .drain(..ready)
                .map(|b| b.to_ascii_uppercase())
                .collect())
        }

        fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
            Ok(self
                .pending
                .drain(..)
                .map(|b| b.to_ascii_uppercase())
                .collect())
        }
    }

    /// Appends a marker at finish
    #[derive(Default)]
    struct Suffix;

    impl Transform for Suffix {
        fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
            Ok(input.to_vec())
        }

        fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
            Ok(b"!".to_vec())
        }
    }

    struct Fails;

    impl Transform for Fails {
        fn update(&mut self, _input: &[u8]) -> SaltpackResult<Vec<u8>> {
            Err(SaltpackError::format("nope"))
        }

        fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
            Err(SaltpackError::format("nope"))
        }
    }

    #[test]
    fn pipe_feeds_first_into_second() {
        let mut pipe = Pipe::new(Groups::default(), Suffix);
        let mut out = pipe.update(b"hello").unwrap();
        assert_eq!(out, b"HELL");
        out.extend(pipe.finish().unwrap());
        assert_eq!(out, b"HELLO!");
    }

    #[test]
    fn run_equals_chunked_updates() {
        let whole = run(&mut Pipe::new(Groups::default(), Suffix), b"abcdefghij").unwrap();

        let mut pipe = Pipe::new(Groups::default(), Suffix);
        let mut chunked = Vec::new();
        for piece in b"abcdefghij".chunks(3) {
            chunked.extend(pipe.update(piece).unwrap());
        }
        chunked.extend(pipe.finish().unwrap());

        assert_eq!(whole, chunked);
    }

    #[test]
    fn copy_reports_bytes_written() {
        let mut reader: &[u8] = b"abcdef";
        let mut out = Vec::new();
        let n = copy(&mut Groups::default(), &mut reader, &mut out).unwrap();
        assert_eq!(out, b"ABCDEF");
        assert_eq!(n, 6);
    }

    #[test]
    fn guard_failure_is_sticky() {
        let mut guard = StreamGuard::default();
        assert!(guard.check().is_ok());
        let result: SaltpackResult<()> = guard.record(Err(SaltpackError::format("bad")));
        assert!(result.is_err());
        assert!(guard.is_failed());
        assert!(matches!(guard.check(), Err(SaltpackError::StreamFailed(_))));
    }

    #[test]
    fn guard_rejects_use_after_finish() {
        let mut guard = StreamGuard::default();
        guard.mark_finished();
        assert!(matches!(guard.check(), Err(SaltpackError::StreamFailed(_))));
    }

    #[test]
    fn errors_propagate_through_pipe() {
        let mut pipe = Pipe::new(Groups::default(), Fails);
        assert!(pipe.update(b"abcd").is_err());
    }
}

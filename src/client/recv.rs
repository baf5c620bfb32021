use std::io::{self, Read};

/// Read exactly `buf.len()` bytes.
///
/// Loops over short reads and retries `EINTR`. Returns `Ok(buf.len())` once
/// the buffer is full, `Ok(0)` if the peer closed first (partial data is
/// discarded).
pub fn recv_all<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Ok(0),
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

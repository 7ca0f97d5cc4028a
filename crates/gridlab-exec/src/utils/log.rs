//! Stderr reporting usable between `fork()` and `execve()`.
//!
//! Only `libc::write` and stack buffers are used: no allocation, no locks.

/// Write `gridlab: <what>[: errno=<n>]\n` to stderr.
#[cfg(unix)]
pub(crate) fn pre_exec_report(what: &[u8], errno: Option<i32>) {
    write_raw(b"gridlab: ");
    write_raw(what);
    if let Some(code) = errno {
        let mut buf = [0u8; 24];
        write_raw(b": errno=");
        write_raw(format_i32(code, &mut buf));
    }
    write_raw(b"\n");
}

#[cfg(unix)]
fn write_raw(bytes: &[u8]) {
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            bytes.as_ptr() as *const libc::c_void,
            bytes.len(),
        );
    }
}

/// Render `n` in decimal into the tail of `buf`.
fn format_i32(n: i32, buf: &mut [u8; 24]) -> &[u8] {
    let mut idx = buf.len();
    let mut rest = n.unsigned_abs();
    loop {
        idx -= 1;
        buf[idx] = b'0' + (rest % 10) as u8;
        rest /= 10;
        if rest == 0 {
            break;
        }
    }
    if n < 0 {
        idx -= 1;
        buf[idx] = b'-';
    }
    &buf[idx..]
}

#[cfg(test)]
mod tests {
    use super::format_i32;

    #[test]
    fn formats_decimal_without_allocation() {
        let mut buf = [0u8; 24];
        assert_eq!(format_i32(0, &mut buf), b"0");
        assert_eq!(format_i32(12, &mut buf), b"12");
        assert_eq!(format_i32(-7, &mut buf), b"-7");
        assert_eq!(format_i32(i32::MIN, &mut buf), b"-2147483648");
    }
}

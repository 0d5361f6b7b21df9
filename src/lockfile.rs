//! The advisory `.plk` sidecar lock (`spec.md` §6): a plain file holding
//! `user@host:pid`, created with `O_EXCL` semantics so two processes racing
//! to open the same database fail cleanly instead of silently clobbering
//! each other's writes.
//!
//! Grounded on `bin/pwsafe-matrix/src/lockfile.rs`'s `LockFile`/`UserInfo`:
//! same exclusive-create-then-write approach and the same uapi-based
//! pid/hostname/username lookup on Unix. That version only ever creates and
//! removes the file; this one additionally parses an existing holder's
//! identity back out (`spec.md`'s stale-lock regex, reimplemented as a plain
//! rightmost-`:`-then-rightmost-`@` split since `regex` is not part of this
//! crate's dependency stack) and reaps a dead local holder once before
//! giving up.

use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub user: String,
    pub host: String,
    pub pid: u32,
}

impl UserInfo {
    #[cfg(unix)]
    pub fn current() -> Result<Self> {
        let pid = uapi::getpid() as u32;

        let host = {
            let mut buffer = [0u8; 256];
            let _ = uapi::gethostname(&mut buffer[..]);
            let terminator = buffer.iter().position(|b| *b == 0).unwrap_or(buffer.len());
            String::from_utf8_lossy(&buffer[..terminator]).into_owned()
        };

        let user = {
            let euid = uapi::geteuid();
            let mut pwd = core::mem::MaybeUninit::<uapi::c::passwd>::zeroed();
            let mut buffer = vec![0u8; 4096];
            let mut pwd_ptr = core::ptr::null_mut();

            loop {
                let status = unsafe {
                    uapi::c::getpwuid_r(euid, pwd.as_mut_ptr(), buffer.as_mut_ptr() as *mut i8, buffer.len(), &mut pwd_ptr)
                };
                match status {
                    0 => break,
                    uapi::c::ERANGE if buffer.len() < (1 << 20) => {
                        let newlen = buffer.len() * 2;
                        buffer.resize(newlen, 0);
                    }
                    err => return Err(Error::AccessDenied(std::io::Error::from_raw_os_error(err))),
                }
            }

            if pwd_ptr != pwd.as_mut_ptr() {
                return Err(Error::AccessDenied(std::io::Error::other("user not found in passwd database")));
            }

            let passwd = unsafe { pwd.assume_init() };
            let offset = (passwd.pw_name as usize) - (buffer.as_ptr() as usize);
            let cstr = core::ffi::CStr::from_bytes_until_nul(&buffer[offset..])
                .map_err(|_| Error::AccessDenied(std::io::Error::other("malformed passwd entry")))?;
            String::from_utf8_lossy(cstr.to_bytes()).into_owned()
        };

        Ok(UserInfo { user, host, pid })
    }

    #[cfg(not(unix))]
    pub fn current() -> Result<Self> {
        let user = std::env::var("USERNAME").unwrap_or_else(|_| "unknown".into());
        let host = std::env::var("COMPUTERNAME").unwrap_or_else(|_| "unknown".into());
        Ok(UserInfo {
            user,
            host,
            pid: std::process::id(),
        })
    }

    fn format(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.pid)
    }
}

/// An acquired advisory lock. Removes the sidecar file on drop.
pub struct Lockfile {
    path: PathBuf,
    held: bool,
}

/// The lockfile sidecar path for a database at `db_path`: same path with its
/// extension replaced by `.plk` (`spec.md` §6).
pub fn sidecar_path(db_path: &Path) -> PathBuf {
    db_path.with_extension("plk")
}

impl Lockfile {
    /// Acquires the lock for `db_path`, reaping a stale lock held by a dead
    /// process on the same host (retried at most once).
    pub fn acquire(db_path: &Path) -> Result<Self> {
        let path = sidecar_path(db_path);
        let info = UserInfo::current()?;
        Self::try_acquire(&path, &info, true)
    }

    fn try_acquire(path: &Path, info: &UserInfo, retry_if_stale: bool) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        match options.open(path) {
            Ok(mut file) => {
                write!(file, "{}", info.format()).map_err(Error::Io)?;
                drop(file);
                Ok(Lockfile {
                    path: path.to_path_buf(),
                    held: true,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let content = fs::read_to_string(path).map_err(Error::Io)?;

                if content == info.format() {
                    return Err(Error::LockAlreadyAcquired);
                }

                match parse_holder(&content) {
                    Some((_, host, pid)) if retry_if_stale && host == info.host && !process_is_alive(pid) => {
                        let _ = fs::remove_file(path);
                        Self::try_acquire(path, info, false)
                    }
                    _ => Err(Error::AlreadyLocked(content)),
                }
            }
            Err(e) => Err(Error::AccessDenied(e)),
        }
    }

    pub fn release(mut self) -> Result<()> {
        if !self.held {
            return Err(Error::NotLocked);
        }
        self.held = false;
        fs::remove_file(&self.path).map_err(Error::Io)
    }
}

impl Drop for Lockfile {
    fn drop(&mut self) {
        if self.held {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Splits a lockfile's content into `(user, host, pid)`, matching `spec.md`
/// §6's `^(.*)@([^@:]*):(\d+)$`: the rightmost `:` separates the pid, and of
/// what remains the rightmost `@` separates user from host (the host itself
/// cannot contain `@` or `:`).
fn parse_holder(content: &str) -> Option<(String, String, u32)> {
    let colon = content.rfind(':')?;
    let pid: u32 = content[colon + 1..].parse().ok()?;
    let user_host = &content[..colon];
    let at = user_host.rfind('@')?;
    Some((user_host[..at].to_string(), user_host[at + 1..].to_string(), pid))
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(unix))]
fn process_is_alive(_pid: u32) -> bool {
    // No portable liveness check; assume alive so a stale lock is never
    // reaped incorrectly.
    true
}

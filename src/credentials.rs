//! OS-level identity: the pid/uid/gid credential triple, the admission rule applied to
//! freshly handshaken connections, and lookups that produce credentials from the user
//! directory.

use crate::{
    error::{Error, ErrorKind},
    os::unix::c_wrappers,
    poison_error, LOCK_POISON,
};
use libc::{c_char, c_int, gid_t, pid_t, uid_t};
use std::{
    ffi::{CStr, CString},
    mem::MaybeUninit,
    ptr,
    sync::Mutex,
};

/// OS-attested identity of a process, with every field individually optional, since not
/// every acquisition path can fill all of them.
///
/// Produced from the calling process, from a user directory lookup or from peer credential
/// collection during the handshake.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Credentials {
    /// Process ID, when known.
    pub pid: Option<pid_t>,
    /// User ID, when known.
    pub uid: Option<uid_t>,
    /// Group ID, when known.
    pub gid: Option<gid_t>,
}

impl Credentials {
    /// The fully unknown credential, which peer retrieval falls back to whenever the
    /// platform has nothing to offer.
    pub const UNKNOWN: Self = Self {
        pid: None,
        uid: None,
        gid: None,
    };

    /// Credentials of the calling process.
    pub fn from_current_process() -> Self {
        Self {
            pid: Some(c_wrappers::get_pid()),
            uid: Some(c_wrappers::get_uid()),
            gid: Some(c_wrappers::get_gid()),
        }
    }

    /// Looks the given username up in the user directory. The result carries the entry's
    /// uid and gid and no pid. An entry that simply isn't there comes back as
    /// [`FileNotFound`](ErrorKind::FileNotFound).
    pub fn from_username(username: &str) -> Result<Self, Error> {
        let Ok(name) = CString::new(username) else {
            return Err(Error::new(ErrorKind::Failed));
        };
        let entry = pw_lookup(|pw, buf, buflen, result| unsafe {
            libc::getpwnam_r(name.as_ptr(), pw, buf, buflen, result)
        })?;
        Ok(entry.into_credentials())
    }

    /// Looks the given user ID up in the user directory, same as
    /// [`from_username`](Self::from_username) but keyed by uid.
    pub fn from_user_id(uid: uid_t) -> Result<Self, Error> {
        Ok(pw_entry_for_uid(uid)?.into_credentials())
    }

    /// The admission rule for freshly handshaken connections: whether `provided` may act as
    /// the identity this credential expects.
    ///
    /// Never passes when either uid is unknown. The superuser passes unconditionally;
    /// everyone else passes exactly when the uids are equal. Group and process IDs do not
    /// participate.
    pub fn matches(&self, provided: &Credentials) -> bool {
        let (Some(expected_uid), Some(provided_uid)) = (self.uid, provided.uid) else {
            return false;
        };
        provided_uid == 0 || provided_uid == expected_uid
    }
}

/// Identity answers about the current process, with the expensive user directory lookup
/// cached.
///
/// This replaces an ambient process-global cache: construct one at startup, pass it by
/// reference to whoever needs it, and [`reset`](Self::reset) it in tests that manipulate
/// identity mid-process.
#[derive(Debug, Default)]
pub struct UserInfoService {
    username: Mutex<Option<String>>,
}

impl UserInfoService {
    /// Creates an empty service; nothing is resolved until first asked for.
    pub const fn new() -> Self {
        Self {
            username: Mutex::new(None),
        }
    }

    /// Credentials of the current process. Always fresh, never cached.
    pub fn credentials(&self) -> Credentials {
        Credentials::from_current_process()
    }

    /// Username the current process runs as, from the cache if warm.
    pub fn username(&self) -> Result<String, Error> {
        let mut cached = self.username.lock().map_err(poison_error)?;
        if let Some(name) = &*cached {
            return Ok(name.clone());
        }
        let entry = pw_entry_for_uid(c_wrappers::get_uid())?;
        *cached = Some(entry.name.clone());
        Ok(entry.name)
    }

    /// Drops the cache so that the next query resolves afresh.
    pub fn reset(&self) {
        *self.username.lock().expect(LOCK_POISON) = None;
    }
}

struct PwEntry {
    name: String,
    uid: uid_t,
    gid: gid_t,
}

impl PwEntry {
    fn into_credentials(self) -> Credentials {
        Credentials {
            pid: None,
            uid: Some(self.uid),
            gid: Some(self.gid),
        }
    }
}

fn pw_entry_for_uid(uid: uid_t) -> Result<PwEntry, Error> {
    pw_lookup(|pw, buf, buflen, result| unsafe { libc::getpwuid_r(uid, pw, buf, buflen, result) })
}

const PW_BUF_START: usize = 1024;
const PW_BUF_CAP: usize = 16 * 1024;

/// Drives one of the reentrant passwd lookups, growing the string buffer until the entry
/// fits. The lookup functions report errors through their return value, not errno.
#[allow(clippy::arithmetic_side_effects)] // buffer length is capped well below overflow
fn pw_lookup(
    mut call: impl FnMut(*mut libc::passwd, *mut c_char, libc::size_t, *mut *mut libc::passwd) -> c_int,
) -> Result<PwEntry, Error> {
    let mut buf = vec![0_u8; PW_BUF_START];
    loop {
        let mut pw = MaybeUninit::<libc::passwd>::uninit();
        let mut result = ptr::null_mut::<libc::passwd>();
        let err = call(pw.as_mut_ptr(), buf.as_mut_ptr().cast(), buf.len(), &mut result);
        if err == libc::ERANGE && buf.len() < PW_BUF_CAP {
            let new_len = buf.len() * 2;
            buf.resize(new_len, 0);
            continue;
        }
        if err != 0 {
            return Err(Error::from_raw_os_error(err));
        }
        if result.is_null() {
            // Absence is not an OS failure; the entry just isn't there.
            return Err(Error::new(ErrorKind::FileNotFound));
        }
        let pw = unsafe { pw.assume_init() };
        // pw_name points into buf, so the copy has to happen before the buffer goes away.
        let name = unsafe { CStr::from_ptr(pw.pw_name) }.to_string_lossy().into_owned();
        return Ok(PwEntry {
            name,
            uid: pw.pw_uid,
            gid: pw.pw_gid,
        });
    }
}

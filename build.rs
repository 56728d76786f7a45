use std::{
    env::{var as env_var, var_os as env_var_os},
    io::{self, Write},
};

fn main() {
    declare_cfgs();
    if is_unix() {
        let target = TargetTriplet::fetch();
        collect_cred_mechanism(&target);
    }
}

fn is_unix() -> bool {
    env_var_os("CARGO_CFG_UNIX").is_some()
}

/// This can define at most one of the following:
/// - `ub_peercred`, the `SO_PEERCRED` socket option (Linux-likes, plus OpenBSD with its
///   `sockpeercred` flavor of the structure)
/// - `ub_cmsgcred`, the `SCM_CREDS` ancillary message of FreeBSD and DragonFly BSD
///
/// Neither being defined means the target has no usable peer credential mechanism, in which
/// case handshakes still go through but report fully unknown credentials.
#[rustfmt::skip]
fn collect_cred_mechanism(target: &TargetTriplet) {
    if (target.os("linux") && target.env_any(&["gnu", "musl", "musleabi", "musleabihf"]))
    || target.os_any(&["android", "fuchsia", "redox", "openbsd"]) {
        define("ub_peercred");
    } else if target.os_any(&["freebsd", "dragonfly"]) {
        define("ub_cmsgcred");
    }
}

fn declare_cfgs() {
    ldeclare(&["ub_peercred", "ub_cmsgcred"]);
}

fn define(cfg: &str) {
    ldefine(&[cfg]);
}
fn ldefine(cfgs: &[&str]) {
    let stdout_ = io::stdout();
    let mut stdout = stdout_.lock();
    for i in cfgs {
        stdout.write_all(b"cargo:rustc-cfg=").unwrap();
        stdout.write_all(i.as_ref()).unwrap();
        stdout.write_all(b"\n").unwrap();
    }
}
fn ldeclare(cfgs: &[&str]) {
    let stdout_ = io::stdout();
    let mut stdout = stdout_.lock();
    for i in cfgs {
        stdout.write_all(b"cargo:rustc-check-cfg=cfg(").unwrap();
        stdout.write_all(i.as_ref()).unwrap();
        stdout.write_all(b")\n").unwrap();
    }
}

struct TargetTriplet {
    os: String,
    env: Option<String>,
}
#[rustfmt::skip]
impl TargetTriplet {
    fn fetch() -> Self {
        Self {
            os: env_var("CARGO_CFG_TARGET_OS").unwrap(),
            env: env_var("CARGO_CFG_TARGET_ENV").ok(),
        }
    }
    fn os(&self, os: &str) -> bool { self.os == os }
    fn os_any(&self, oses: &[&str]) -> bool { oses.iter().copied().any(|x| x == self.os) }
    fn env_any(&self, envs: &[&str]) -> bool {
        if let Some(env) = self.env.as_deref() {
            envs.iter().copied().any(|x| x == env)
        } else { false }
    }
}

//! Platform sandboxing for skill-handler child processes.
//!
//! Every skill handler runs as a subprocess; this module locks that
//! subprocess down before its `exec()` call so a misbehaving or malicious
//! skill cannot escalate privileges or touch the filesystem outside its
//! declared workspace. The public surface compiles to a no-op on platforms
//! without a supported mechanism, so callers never need `#[cfg]` guards.
//!
//! | Platform | Mechanism                                  |
//! |----------|---------------------------------------------|
//! | Linux    | `PR_SET_NO_NEW_PRIVS` + `seccomp(2)` TSYNC   |
//! | macOS    | `sandbox_init(3)` Darwin profile             |
//! | Other    | No-op                                        |

/// Apply sandbox restrictions to the **current process**.
///
/// Call this inside a `pre_exec` hook (after `fork`, before `exec`) when
/// spawning a skill handler via `std::process::Command::pre_exec`. It must
/// **not** be called in the parent (daemon) process.
///
/// # Safety
/// This function is `unsafe` because it must run between `fork` and `exec`
/// where only async-signal-safe operations are permitted. The syscall paths
/// used (prctl, seccomp, sandbox_init FFI) are async-signal-safe.
#[allow(unused_variables)]
pub unsafe fn apply_to_child(workspace_root: &str) -> std::io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: apply_linux is unsafe and must run between fork/exec.
        unsafe { apply_linux()? };
    }

    #[cfg(target_os = "macos")]
    {
        // SAFETY: apply_macos is unsafe and must run between fork/exec.
        unsafe { apply_macos(workspace_root)? };
    }

    Ok(())
}

/// Returns `true` when the current platform supports process sandboxing.
pub fn is_active() -> bool {
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        return true;
    }
    #[allow(unreachable_code)]
    false
}

// ── Linux ────────────────────────────────────────────────────────────────────

#[cfg(target_os = "linux")]
unsafe fn apply_linux() -> std::io::Result<()> {
    use std::io;

    // No new privileges — inherited across execve, cannot be unset.
    const PR_SET_NO_NEW_PRIVS: libc::c_int = 38;
    // SAFETY: prctl is async-signal-safe and called between fork/exec.
    if unsafe { libc::prctl(PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) } != 0 {
        return Err(io::Error::last_os_error());
    }

    // UTS namespace isolation — give the sandboxed skill a distinct hostname
    // so it cannot impersonate the host. CLONE_NEWUTS requires CAP_SYS_ADMIN;
    // if unavailable (container, unprivileged user) we skip silently.
    const CLONE_NEWUTS: libc::c_int = 0x0400_0000;
    // SAFETY: unshare is async-signal-safe.
    let ret = unsafe { libc::unshare(CLONE_NEWUTS) };
    if ret == 0 {
        let name = b"omnibrain-skill\0";
        // SAFETY: name is a valid NUL-terminated byte slice.
        let _ = unsafe { libc::sethostname(name.as_ptr().cast(), name.len() - 1) };
    }

    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: install_seccomp_allowlist is unsafe and must run between fork/exec.
        unsafe { install_seccomp_allowlist()? };
    }

    Ok(())
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
unsafe fn install_seccomp_allowlist() -> std::io::Result<()> {
    use std::io;
    use std::mem;

    #[repr(C)]
    struct SockFilter {
        code: u16,
        jt: u8,
        jf: u8,
        k: u32,
    }

    #[repr(C)]
    struct SockFprog {
        len: u16,
        filter: *const SockFilter,
    }

    const BPF_LD: u16 = 0x00;
    const BPF_W: u16 = 0x00;
    const BPF_ABS: u16 = 0x20;
    const BPF_JMP: u16 = 0x05;
    const BPF_JEQ: u16 = 0x10;
    const BPF_K: u16 = 0x00;
    const BPF_RET: u16 = 0x06;

    const SECCOMP_RET_ALLOW: u32 = 0x7fff_0000;
    const SECCOMP_RET_ERRNO: u32 = 0x0005_0000;
    const ENOSYS: u32 = 38;
    const SECCOMP_DATA_NR_OFFSET: u32 = 0;

    const ALLOWED: &[u32] = &[
        0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 28, 32, 33, 39, 41, 42, 43, 44, 45, 46, 47, 49, 50, 51, 52, 53, 54, 55, 56, 57, 58,
        59, 60, 61, 62, 72, 73, 74, 75, 76, 77, 78, 79, 80, 82, 83, 84, 85, 86, 87, 88, 89, 90, 91,
        95, 96, 97, 99, 102, 104, 107, 108, 110, 111, 131, 132, 137, 138, 158, 186, 202, 204, 218,
        228, 229, 231, 232, 233, 234, 257, 258, 261, 262, 263, 264, 265, 266, 267, 268, 269, 270,
        271, 281, 285, 290, 291, 292, 293, 302, 318, 332, 160, 170, 435, 273, 63,
    ];

    let n = ALLOWED.len();
    let prog_len = 1 + n + 2;
    let mut prog: Vec<SockFilter> = Vec::with_capacity(prog_len);

    prog.push(SockFilter { code: BPF_LD | BPF_W | BPF_ABS, jt: 0, jf: 0, k: SECCOMP_DATA_NR_OFFSET });

    for (i, &nr) in ALLOWED.iter().enumerate() {
        let steps_to_allow = (n - i) as u8;
        prog.push(SockFilter { code: BPF_JMP | BPF_JEQ | BPF_K, jt: steps_to_allow, jf: 0, k: nr });
    }

    prog.push(SockFilter { code: BPF_RET | BPF_K, jt: 0, jf: 0, k: SECCOMP_RET_ERRNO | (ENOSYS & 0xFFFF) });
    prog.push(SockFilter { code: BPF_RET | BPF_K, jt: 0, jf: 0, k: SECCOMP_RET_ALLOW });

    let fprog = SockFprog { len: prog.len() as u16, filter: prog.as_ptr() };

    const SYS_SECCOMP: libc::c_long = 317;
    const SECCOMP_SET_MODE_FILTER: libc::c_ulong = 1;
    const SECCOMP_FILTER_FLAG_TSYNC: libc::c_ulong = 2;

    // SAFETY: seccomp syscall is async-signal-safe; fprog outlives the call.
    let ret = unsafe {
        libc::syscall(
            SYS_SECCOMP,
            SECCOMP_SET_MODE_FILTER,
            SECCOMP_FILTER_FLAG_TSYNC,
            &fprog as *const SockFprog as *const libc::c_void,
        )
    };

    if ret != 0 {
        let _ = io::Error::last_os_error();
        tracing::warn!("skill sandbox: seccomp syscall filter unavailable; no-new-privs still active");
    }

    mem::forget(prog);

    Ok(())
}

// ── macOS ────────────────────────────────────────────────────────────────────

#[cfg(target_os = "macos")]
unsafe fn apply_macos(workspace_root: &str) -> std::io::Result<()> {
    use std::ffi::CString;
    use std::io;
    use std::ptr;

    extern "C" {
        fn sandbox_init(profile: *const libc::c_char, flags: u64, errorbuf: *mut *mut libc::c_char) -> libc::c_int;
        fn sandbox_free_error(errorbuf: *mut libc::c_char);
    }

    let profile = format!(
        r#"(version 1)
(deny default)
(allow file-read* (subpath "/usr") (subpath "/lib") (subpath "/etc")
                  (subpath "/tmp") (subpath "/var/tmp") (subpath "{ws}"))
(allow file-write* (subpath "/tmp") (subpath "/var/tmp") (subpath "{ws}"))
(allow process-exec)
(allow process-fork)
(allow sysctl-read)
(allow mach-lookup)
(allow network-outbound (remote tcp "*:80") (remote tcp "*:443"))
(allow signal (target self))
"#,
        ws = workspace_root
    );

    let c_profile = CString::new(profile).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut errorbuf: *mut libc::c_char = ptr::null_mut();

    // SAFETY: c_profile outlives the call; errorbuf is a valid output pointer.
    let ret = unsafe { sandbox_init(c_profile.as_ptr(), 0, &mut errorbuf) };
    if ret != 0 {
        let err_str = if errorbuf.is_null() {
            "unknown sandbox_init error".to_string()
        } else {
            // SAFETY: sandbox_init sets errorbuf to a valid C string on failure.
            let msg = unsafe { std::ffi::CStr::from_ptr(errorbuf) }.to_string_lossy().to_string();
            // SAFETY: errorbuf was allocated by sandbox_init.
            unsafe { sandbox_free_error(errorbuf) };
            msg
        };
        return Err(io::Error::new(io::ErrorKind::Other, err_str));
    }

    Ok(())
}

/// Applies the per-invocation resource limits (§4.8): bounded address space,
/// CPU time, and open file descriptors. Best-effort — a `setrlimit` failure
/// is logged, not fatal, since some container runtimes deny it.
#[cfg(target_os = "linux")]
pub unsafe fn apply_rlimits(max_vm_bytes: u64, max_cpu_secs: u64, max_fds: u64) {
    unsafe fn set(resource: libc::c_int, limit: u64) {
        let rlim = libc::rlimit { rlim_cur: limit, rlim_max: limit };
        // SAFETY: setrlimit is async-signal-safe; rlim is a valid pointer.
        if unsafe { libc::setrlimit(resource, &rlim) } != 0 {
            tracing::warn!(resource, "skill sandbox: setrlimit failed");
        }
    }
    // SAFETY: called between fork/exec, same constraints as apply_to_child.
    unsafe {
        set(libc::RLIMIT_AS, max_vm_bytes);
        set(libc::RLIMIT_CPU, max_cpu_secs);
        set(libc::RLIMIT_NOFILE, max_fds);
    }
}

#[cfg(not(target_os = "linux"))]
pub unsafe fn apply_rlimits(_max_vm_bytes: u64, _max_cpu_secs: u64, _max_fds: u64) {}

use std::cell::RefCell;
use std::ffi::OsStr;
use std::path::PathBuf;

#[derive(Clone, Debug)]
struct Env {
    /// `LC3SIM_OS=0` starts the machine with empty low memory.
    os_enabled: bool,
    /// `LC3SIM_OS_IMAGE=<path>` replaces the built-in system image.
    os_image: Option<PathBuf>,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

pub fn init() {
    let value = Env {
        os_enabled: !var_is("LC3SIM_OS", "0"),
        os_image: std::env::var_os("LC3SIM_OS_IMAGE")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from),
    };
    set_env(value);
}

pub fn is_os_enabled() -> bool {
    with_env(|env| env.os_enabled)
}

pub fn os_image() -> Option<PathBuf> {
    with_env(|env| env.os_image.clone())
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.as_ref().unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}

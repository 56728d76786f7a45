use std::sync::Mutex;

pub type TestResult<T = ()> = color_eyre::eyre::Result<T>;

// color_eyre politely refuses a second installation, so gate it process-wide.
static COLOR_EYRE_INSTALLED: Mutex<bool> = Mutex::new(false);
pub(super) fn install() {
    let mut lock = COLOR_EYRE_INSTALLED.lock().unwrap();
    if !*lock {
        let _ = color_eyre::install();
        *lock = true;
    }
}

/// `assert_eq!`, except that it reports through the test's `Result` instead of panicking.
macro_rules! ensure_eq {
    ($left:expr, $right:expr $(,)?) => {
        match (&$left, &$right) {
            (left_val, right_val) => {
                ::color_eyre::eyre::ensure!(
                    (left_val == right_val),
                    "assertion failed: `(left == right)`\n  left: `{:?}`,\n right: `{:?}`",
                    left_val,
                    right_val
                );
            }
        }
    };
    ($left:expr, $right:expr, $($arg:tt)+) => {
        match (&$left, &$right) {
            (left_val, right_val) => {
                ::color_eyre::eyre::ensure!(
                    (left_val == right_val),
                    "assertion failed: `(left == right)`\n  left: `{:?}`,\n right: `{:?}`: {}",
                    left_val,
                    right_val,
                    ::core::format_args!($($arg)+)
                );
            }
        }
    };
}

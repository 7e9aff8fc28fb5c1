//! Process-terminating wrapper for front ends that want the legacy behaviour: a failed dataport
//! precondition ends the run instead of being handled.

use std::fmt::Display;

use tracing::error;

/// Exit status used when a call is aborted.
pub const ABORT_EXIT_CODE: i32 = 1;

/// Returns the value of `result`, or logs the error and exits the process.
pub fn or_abort<T, E: Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            error!(%err, "fatal dataport error, aborting");
            eprintln!("error: {err}");
            std::process::exit(ABORT_EXIT_CODE);
        }
    }
}

/// Like [`or_abort`], but only when `abort` is set; otherwise hands the result back.
pub fn abort_if<T, E: Display>(abort: bool, result: Result<T, E>) -> Result<T, E> {
    if abort {
        Ok(or_abort(result))
    } else {
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_values_through() {
        assert_eq!(or_abort::<_, String>(Ok(5)), 5);
        assert_eq!(abort_if(false, Err::<u8, _>("bad")), Err("bad"));
        assert_eq!(abort_if::<_, String>(true, Ok(1)), Ok(1));
    }
}

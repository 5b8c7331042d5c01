//! Tick period arithmetic for the SysTick reload register.

use crate::errors::TimerError;

/// SysTick RELOAD is a 24-bit field.
pub const SYSTICK_MAX_RELOAD: u32 = 0x00FF_FFFF;

/// Compute the SysTick reload value for a tick period.
///
/// The counter fires every `reload + 1` core cycles, so a period of
/// `period_us` at `core_clock_hz` needs `cycles - 1` in RELOAD.
///
/// # Errors
///
/// - [`TimerError::InvalidConfig`] if either argument is zero
/// - [`TimerError::UnsupportedPeriod`] if the period rounds to zero cycles
///   or does not fit the 24-bit counter
pub const fn systick_reload(core_clock_hz: u32, period_us: u32) -> Result<u32, TimerError> {
    if core_clock_hz == 0 || period_us == 0 {
        return Err(TimerError::InvalidConfig);
    }

    let cycles = (core_clock_hz as u64 * period_us as u64) / 1_000_000;
    if cycles == 0 || cycles - 1 > SYSTICK_MAX_RELOAD as u64 {
        return Err(TimerError::UnsupportedPeriod(period_us));
    }

    Ok((cycles - 1) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_for_one_millisecond() {
        // MK64F12 default core clock
        assert_eq!(systick_reload(20_971_520, 1_000), Ok(20_970));
        assert_eq!(systick_reload(120_000_000, 1_000), Ok(119_999));
    }

    #[test]
    fn test_reload_limits() {
        // 16_777_216 cycles is one more than the counter holds
        assert_eq!(
            systick_reload(16_777_216, 1_000_000),
            Err(TimerError::UnsupportedPeriod(1_000_000))
        );
        assert_eq!(systick_reload(16_777_216, 999_999), Ok(16_777_198));
        // Below one cycle per period
        assert_eq!(systick_reload(1_000, 1), Err(TimerError::UnsupportedPeriod(1)));
    }

    #[test]
    fn test_reload_rejects_zero() {
        assert_eq!(systick_reload(0, 1_000), Err(TimerError::InvalidConfig));
        assert_eq!(systick_reload(48_000_000, 0), Err(TimerError::InvalidConfig));
    }
}

//! Timer helpers for whichever runtime feature is enabled

use std::time::Duration;

/// Sleep for the specified duration on the enabled runtime
///
/// Smol timers are preferred when both runtime features are on, since they
/// work without a surrounding Tokio context.
pub async fn sleep(duration: Duration) {
    #[cfg(feature = "smol")]
    {
        ::smol::Timer::after(duration).await;
    }

    #[cfg(all(feature = "tokio", not(feature = "smol")))]
    {
        ::tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "smol")]
    #[test]
    fn test_sleep() {
        ::smol::block_on(async {
            let start = std::time::Instant::now();
            sleep(Duration::from_millis(50)).await;
            assert!(start.elapsed() >= Duration::from_millis(50));
        });
    }
}

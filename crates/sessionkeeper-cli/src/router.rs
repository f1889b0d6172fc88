//! Terminal counterpart of page navigation: redirects become messages and
//! decide whether the running command keeps going.

use anyhow::Result;
use tokio::sync::mpsc::UnboundedReceiver;

use sessionkeeper_core::navigation::Redirect;

pub fn message(redirect: Redirect) -> &'static str {
    match redirect {
        Redirect::Login => "Session ended. Run `sessionkeeper login` to sign in again.",
        Redirect::Unauthorized => "Access denied for this account.",
        Redirect::SubscriptionExpired => "Subscription has expired. Renew it to continue.",
    }
}

/// Report `redirect` and turn it into the command's result.
/// Landing on the login page is a normal end of session.
pub fn finish(redirect: Redirect) -> Result<()> {
    eprintln!("\n{}", message(redirect));
    match redirect {
        Redirect::Login => Ok(()),
        other => anyhow::bail!("redirected to {}", other.path()),
    }
}

/// Drain redirects emitted while a one-shot command ran, reporting each.
/// Returns the last one.
pub fn report_pending(redirects: &mut UnboundedReceiver<Redirect>) -> Option<Redirect> {
    let mut last = None;
    while let Ok(redirect) = redirects.try_recv() {
        eprintln!("{}", message(redirect));
        last = Some(redirect);
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionkeeper_core::navigation::Navigator;

    #[test]
    fn test_finish_login_is_not_an_error() {
        assert!(finish(Redirect::Login).is_ok());
        assert!(finish(Redirect::Unauthorized).is_err());
        assert!(finish(Redirect::SubscriptionExpired).is_err());
    }

    #[test]
    fn test_report_pending_returns_last() {
        let (navigator, mut rx) = Navigator::new("/dashboard");
        assert_eq!(report_pending(&mut rx), None);

        navigator.navigate(Redirect::Unauthorized);
        navigator.navigate(Redirect::Login);
        assert_eq!(report_pending(&mut rx), Some(Redirect::Login));
        assert_eq!(report_pending(&mut rx), None);
    }
}

use fantoccini::error::{CmdError, ErrorStatus};
use lingua_common::{HarvestError, Locator};

/// Borrow a [`Locator`] as the `fantoccini` equivalent.
pub(crate) fn to_fantoccini(locator: &Locator) -> fantoccini::Locator<'_> {
    match locator {
        Locator::Css(selector) => fantoccini::Locator::Css(selector),
        Locator::XPath(path) => fantoccini::Locator::XPath(path),
    }
}

/// Map a WebDriver command failure onto the harvest taxonomy.
///
/// `op` names the attempted interaction and ends up in the message.
pub(crate) fn classify(op: &str, err: CmdError) -> HarvestError {
    match &err {
        CmdError::WaitTimeout => HarvestError::NotFound(format!("{op}: {err}")),
        _ if err.is_no_such_element() => HarvestError::NotFound(format!("{op}: {err}")),
        CmdError::Standard(wd) if wd.error == ErrorStatus::StaleElementReference => {
            HarvestError::Stale(format!("{op}: {err}"))
        }
        CmdError::Standard(wd)
            if wd.error == ErrorStatus::InvalidSessionId
                || wd.error == ErrorStatus::SessionNotCreated =>
        {
            HarvestError::Fatal(format!("{op}: {err}"))
        }
        CmdError::Lost(_) => HarvestError::Fatal(format!("{op}: {err}")),
        _ => HarvestError::Transient(format!("{op}: {err}")),
    }
}

//! Collapse per-server observations into one result per account.

use crate::models::{AccountIdentifier, AccountLastLogonResult, ServerObservation};

/// Reduce the observations gathered for `account` to a single result.
///
/// The most recent non-sentinel logon wins; on equal timestamps the first
/// observation in server-enumeration order is kept. When no server recorded
/// a logon, descriptive fields come from the first observation and
/// `last_logon` stays `None`.
pub fn reduce(account: AccountIdentifier, observations: &[ServerObservation]) -> AccountLastLogonResult {
    let mut winner: Option<(&ServerObservation, chrono::DateTime<chrono::Utc>)> = None;
    for observation in observations {
        let Some(logon) = observation.last_logon() else {
            continue;
        };
        match winner {
            Some((_, best)) if logon <= best => {}
            _ => winner = Some((observation, logon)),
        }
    }

    match (winner, observations.first()) {
        (Some((observation, logon)), _) => {
            let mut result = from_observation(account, observation);
            result.source_server_name = Some(observation.server_name.clone());
            result.last_logon = Some(logon);
            result
        }
        (None, Some(first)) => from_observation(account, first),
        (None, None) => AccountLastLogonResult::unknown(account),
    }
}

fn from_observation(account: AccountIdentifier, observation: &ServerObservation) -> AccountLastLogonResult {
    AccountLastLogonResult {
        display_name: observation.display_name.clone(),
        account_identifier: account,
        sam_account_name: observation.sam_account_name.clone(),
        source_server_name: None,
        last_logon: None,
        description: observation.description.clone(),
        when_created: observation.when_created,
    }
}

use crate::api::{ApiError, Transport, YouTrackClient};
use crate::models::{from_millis, VoteEvent, VoteState};
use log::{debug, info};

const DUPLICATE_LINK: &str = "Duplicate";

// Replay vote additions/removals in order. Removing an absent voter is a no-op.
pub fn apply_events<I>(state: &mut VoteState, events: I)
where
    I: IntoIterator<Item = VoteEvent>,
{
    for event in events {
        if event.added {
            state.insert(event.voter, event.timestamp);
        } else {
            state.remove(&event.voter);
        }
    }
}

// Later entries overwrite earlier ones for the same voter
pub fn merge(state: &mut VoteState, other: VoteState) {
    state.extend(other);
}

// Current voters of a single issue, duplicates not included
pub async fn collect_vote_timestamps<T: Transport>(
    client: &YouTrackClient<T>,
    issue_id: &str,
) -> Result<VoteState, ApiError> {
    let activities = client.issue_vote_activities(issue_id).await?;
    let mut state = VoteState::new();
    apply_events(&mut state, activities.iter().map(VoteEvent::from));
    debug!("{}: {} current voters from {} vote events", issue_id, state.len(), activities.len());
    Ok(state)
}

// Votes of the issue plus those of its direct duplicates. Each duplicate's
// reporter counts as a voter at the duplicate's creation time. Duplicates of
// duplicates are not followed.
pub async fn collect_vote_timestamps_recursive<T: Transport>(
    client: &YouTrackClient<T>,
    issue_id: &str,
) -> Result<VoteState, ApiError> {
    let mut result = collect_vote_timestamps(client, issue_id).await?;

    let links = client.issue_links(issue_id).await?;
    for link in links.into_iter().filter(|l| l.link_type.name == DUPLICATE_LINK) {
        for duplicate in link.issues {
            let duplicate_id = duplicate.id_readable;
            info!("{}: merging votes from duplicate {}", issue_id, duplicate_id);

            let details = client.issue_details(&duplicate_id).await?;
            result.insert(details.reporter.login, from_millis(details.created));

            let duplicate_votes = collect_vote_timestamps(client, &duplicate_id).await?;
            merge(&mut result, duplicate_votes);
        }
    }

    Ok(result)
}

//! Front-end actions that span the store and the notification service.

use tracing::{info, warn};

use crate::datastore::TaskStore;
use crate::error::{DispatchError, TaskError};
use crate::kv::KeyValueStore;
use crate::notify::{Invite, InviteDispatcher};
use crate::task::{Task, TaskDraft};

#[derive(Debug)]
pub struct AddTaskOutcome {
    pub task: Task,
    /// `None` when the task has no assignee and no invite was attempted.
    pub invite: Option<Result<(), DispatchError>>,
}

impl AddTaskOutcome {
    pub fn invite_failed(&self) -> bool {
        matches!(self.invite, Some(Err(_)))
    }
}

/// Creates the task, then invites its assignee if it has one.
///
/// The task is persisted before the invite goes out and stays persisted
/// whatever the dispatcher answers.
#[tracing::instrument(skip(store, dispatcher, draft))]
pub fn add_task<S, D>(
    store: &mut TaskStore<S>,
    dispatcher: &D,
    draft: TaskDraft,
    sender: &str,
) -> Result<AddTaskOutcome, TaskError>
where
    S: KeyValueStore,
    D: InviteDispatcher + ?Sized,
{
    let task = store.create(draft)?;

    let invite = task.assigned_email().map(|to| {
        let invite = Invite {
            to: to.to_string(),
            from: sender.to_string(),
            task_name: task.title().to_string(),
            description: format!("Due {}", task.due_date().format("%Y-%m-%d")),
        };
        let result = dispatcher.send_invite(&invite);
        if let Err(err) = &result {
            warn!(id = %task.id(), to = %invite.to, error = %err, "invite failed; task kept");
        }
        result
    });

    Ok(AddTaskOutcome { task, invite })
}

/// Sends a standalone invite, without creating a task.
#[tracing::instrument(skip(dispatcher, invite), fields(to = %invite.to))]
pub fn assign_task<D>(dispatcher: &D, invite: &Invite) -> Result<(), DispatchError>
where
    D: InviteDispatcher + ?Sized,
{
    invite.validate()?;
    dispatcher.send_invite(invite)?;
    info!(task = %invite.task_name, "invite sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::kv::MemoryStore;
    use crate::task::fixtures::date;

    #[derive(Default)]
    struct Recorder {
        fail: bool,
        sent: RefCell<Vec<Invite>>,
    }

    impl InviteDispatcher for Recorder {
        fn send_invite(&self, invite: &Invite) -> Result<(), DispatchError> {
            self.sent.borrow_mut().push(invite.clone());
            if self.fail {
                Err(DispatchError::Rejected {
                    status: 500,
                    reason: "Failed to send email.".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn unassigned_task_sends_nothing() {
        let mut store = TaskStore::new(MemoryStore::new());
        let recorder = Recorder::default();

        let outcome = add_task(&mut store, &recorder, TaskDraft::new("solo", date(2025, 3, 7)), "sam")
            .expect("add");
        assert!(outcome.invite.is_none());
        assert!(recorder.sent.borrow().is_empty());
    }

    #[test]
    fn assignee_gets_invite_with_task_details() {
        let mut store = TaskStore::new(MemoryStore::new());
        let recorder = Recorder::default();
        let draft = TaskDraft::new("Capstone", date(2025, 3, 7)).assigned_to("pal@example.com");

        let outcome = add_task(&mut store, &recorder, draft, "sam").expect("add");
        assert!(matches!(outcome.invite, Some(Ok(()))));

        let sent = recorder.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "pal@example.com");
        assert_eq!(sent[0].from, "sam");
        assert_eq!(sent[0].task_name, "Capstone");
        assert_eq!(sent[0].description, "Due 2025-03-07");
    }

    #[test]
    fn failed_invite_keeps_the_task() {
        let mut store = TaskStore::new(MemoryStore::new());
        let recorder = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let draft = TaskDraft::new("Capstone", date(2025, 3, 7)).assigned_to("pal@example.com");

        let outcome = add_task(&mut store, &recorder, draft, "sam").expect("add");
        assert!(outcome.invite_failed());
        assert_eq!(store.load().expect("load"), vec![outcome.task]);
    }

    #[test]
    fn invalid_draft_sends_nothing() {
        let mut store = TaskStore::new(MemoryStore::new());
        let recorder = Recorder::default();
        let draft = TaskDraft::new(" ", date(2025, 3, 7)).assigned_to("pal@example.com");

        assert!(add_task(&mut store, &recorder, draft, "sam").is_err());
        assert!(recorder.sent.borrow().is_empty());
    }

    #[test]
    fn assign_validates_before_dispatch() {
        let recorder = Recorder::default();
        let invite = Invite {
            to: String::new(),
            from: "sam".to_string(),
            task_name: "Capstone".to_string(),
            description: String::new(),
        };
        assert!(matches!(assign_task(&recorder, &invite), Err(DispatchError::InvalidInvite(_))));
        assert!(recorder.sent.borrow().is_empty());
    }
}

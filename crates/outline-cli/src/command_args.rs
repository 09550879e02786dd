//! Translates flag-based CLI subcommands into [`Command`] values: parses
//! string ids, mints a fresh `event_id` under the invocation's `--session`
//! originator, and fills in `user_id`.

use anyhow::{Context, Result};
use clap::Args;
use outline_types::{Command, ContainerId, EventId, NodeId, UserId};
use uuid::Uuid;

/// How the target container of an `insert` is named: either explicitly, or
/// implied by an existing sibling/parent the new node attaches to.
#[derive(Args)]
pub struct ContainerTarget {
    /// Container the new node will live in.
    #[arg(long)]
    pub container: String,
    /// User id recorded as the inserted node's own pre-assigned id. Defaults
    /// to a fresh random id if omitted.
    #[arg(long)]
    pub uuid: Option<String>,
}

fn parse_container(raw: &str) -> Result<ContainerId> {
    Ok(ContainerId(raw.parse().context("parsing container id")?))
}

fn parse_node(raw: &str) -> Result<NodeId> {
    Ok(NodeId(raw.parse().context("parsing node id")?))
}

fn parse_opt_node(raw: Option<String>) -> Result<Option<NodeId>> {
    raw.map(|s| parse_node(&s)).transpose()
}

fn fresh_event_id(session: &str) -> Result<EventId> {
    EventId::new(Uuid::new_v4(), session).context("building event id")
}

pub fn insert_command(
    session: &str,
    target: ContainerTarget,
    parent: Option<String>,
    prev: Option<String>,
    content: String,
    creator: String,
) -> Result<Command> {
    let uuid = match target.uuid {
        Some(raw) => parse_node(&raw)?,
        None => NodeId::new(),
    };
    Ok(Command::InsertNode {
        uuid,
        container_id: parse_container(&target.container)?,
        parent_id: parse_opt_node(parent)?,
        prev_id: parse_opt_node(prev)?,
        content,
        creator_id: UserId::from(creator),
        event_id: fresh_event_id(session)?,
        user_id: UserId::from(session),
    })
}

pub fn change_content_command(session: &str, node: &str, content: String) -> Result<Command> {
    Ok(Command::ChangeContent {
        node_id: parse_node(node)?,
        content,
        event_id: fresh_event_id(session)?,
        user_id: UserId::from(session),
    })
}

pub fn move_command(session: &str, node: &str, parent: Option<String>, prev: Option<String>) -> Result<Command> {
    Ok(Command::MoveNode {
        node_id: parse_node(node)?,
        parent_id: parse_opt_node(parent)?,
        prev_id: parse_opt_node(prev)?,
        event_id: fresh_event_id(session)?,
        user_id: UserId::from(session),
    })
}

pub fn move_to_container_command(
    session: &str,
    node: &str,
    target: &str,
    parent: Option<String>,
    prev: Option<String>,
) -> Result<Command> {
    Ok(Command::MoveNodeToContainer {
        node_id: parse_node(node)?,
        target_container_id: parse_container(target)?,
        parent_id: parse_opt_node(parent)?,
        prev_id: parse_opt_node(prev)?,
        event_id: fresh_event_id(session)?,
        user_id: UserId::from(session),
    })
}

pub fn move_up_command(session: &str, node: &str) -> Result<Command> {
    Ok(Command::MoveUp { node_id: parse_node(node)?, event_id: fresh_event_id(session)?, user_id: UserId::from(session) })
}

pub fn move_down_command(session: &str, node: &str) -> Result<Command> {
    Ok(Command::MoveDown { node_id: parse_node(node)?, event_id: fresh_event_id(session)?, user_id: UserId::from(session) })
}

pub fn indent_command(session: &str, node: &str) -> Result<Command> {
    Ok(Command::Indent { node_id: parse_node(node)?, event_id: fresh_event_id(session)?, user_id: UserId::from(session) })
}

pub fn outdent_command(session: &str, node: &str) -> Result<Command> {
    Ok(Command::Outdent { node_id: parse_node(node)?, event_id: fresh_event_id(session)?, user_id: UserId::from(session) })
}

pub fn split_command(session: &str, node: &str, start: usize, stop: usize) -> Result<Command> {
    Ok(Command::SplitNode {
        node_id: parse_node(node)?,
        selection: (start, stop),
        new_uuid: NodeId::new(),
        event_id: fresh_event_id(session)?,
        user_id: UserId::from(session),
    })
}

pub fn merge_prev_command(session: &str, node: &str) -> Result<Command> {
    Ok(Command::MergePrev { node_id: parse_node(node)?, event_id: fresh_event_id(session)?, user_id: UserId::from(session) })
}

pub fn merge_next_command(session: &str, node: &str) -> Result<Command> {
    Ok(Command::MergeNext { node_id: parse_node(node)?, event_id: fresh_event_id(session)?, user_id: UserId::from(session) })
}

pub fn delete_command(session: &str, node: &str) -> Result<Command> {
    Ok(Command::DeleteNode { node_id: parse_node(node)?, event_id: fresh_event_id(session)?, user_id: UserId::from(session) })
}

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use super::MAX_REPLY_DEPTH;
use crate::db::models::ThreadMessage;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageNode {
    #[serde(flatten)]
    pub message: ThreadMessage,
    pub children: Vec<MessageNode>,
}

impl Drop for MessageNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Nest a thread's flat message list into reply trees.
///
/// A message is a root when it replies to nothing or to a message that is not
/// in `messages`. Siblings keep their input order. Each message appears at
/// most once, so a malformed reply cycle is cut rather than followed. No tree
/// is deeper than `MAX_REPLY_DEPTH`; replies below that are lifted out as
/// extra roots after the others.
pub fn build_tree(messages: &[ThreadMessage]) -> Vec<MessageNode> {
    let index: HashMap<i64, usize> = messages
        .iter()
        .enumerate()
        .map(|(i, m)| (m.mid, i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); messages.len()];
    let mut pending = VecDeque::new();

    for (i, message) in messages.iter().enumerate() {
        match message.reply_to.and_then(|parent| index.get(&parent)) {
            Some(&parent) if parent != i => children[parent].push(i),
            _ => pending.push_back(i),
        }
    }

    let mut placed = vec![false; messages.len()];
    let mut forest = Vec::with_capacity(pending.len());
    let mut next = 0;

    loop {
        while let Some(root) = pending.pop_front() {
            if !placed[root] {
                forest.push(assemble(root, messages, &children, &mut placed, &mut pending));
            }
        }

        // Anything still unplaced sits on a reply cycle with no root above it.
        while next < messages.len() && placed[next] {
            next += 1;
        }
        if next == messages.len() {
            break;
        }
        pending.push_back(next);
    }

    forest
}

/// Post-order assembly with an explicit stack, so reply depth is bounded by
/// heap rather than call stack. Children of a node at the depth limit go to
/// `overflow` instead.
fn assemble(
    root: usize,
    messages: &[ThreadMessage],
    children: &[Vec<usize>],
    placed: &mut [bool],
    overflow: &mut VecDeque<usize>,
) -> MessageNode {
    let mut built: HashMap<usize, MessageNode> = HashMap::new();
    let mut kept: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut stack = vec![(root, 0, false)];
    placed[root] = true;

    while let Some((i, depth, expanded)) = stack.pop() {
        if expanded {
            let kids = kept
                .remove(&i)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|c| built.remove(&c))
                .collect();
            built.insert(
                i,
                MessageNode {
                    message: messages[i].clone(),
                    children: kids,
                },
            );
            continue;
        }

        stack.push((i, depth, true));
        let own = children[i].iter().copied().filter(|&c| !placed[c]);
        if depth >= MAX_REPLY_DEPTH {
            overflow.extend(own);
            continue;
        }

        let own: Vec<usize> = own.collect();
        for &c in own.iter().rev() {
            placed[c] = true;
            stack.push((c, depth + 1, false));
        }
        kept.insert(i, own);
    }

    built.remove(&root).unwrap_or_else(|| MessageNode {
        message: messages[root].clone(),
        children: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(mid: i64, reply_to: Option<i64>) -> ThreadMessage {
        ThreadMessage {
            mid,
            reply_to,
            sender: 1,
            sender_name: Some("ada".to_string()),
            content: format!("message {mid}"),
            thread_id: 1,
            sent_at: format!("2025-11-15 12:00:{:02}.000", mid),
        }
    }

    fn ids(nodes: &[MessageNode]) -> Vec<i64> {
        nodes.iter().map(|n| n.message.mid).collect()
    }

    #[test]
    fn missing_parent_becomes_root() {
        let forest = build_tree(&[msg(1, None), msg(2, Some(1)), msg(3, Some(99))]);

        assert_eq!(ids(&forest), vec![1, 3]);
        assert_eq!(ids(&forest[0].children), vec![2]);
        assert!(forest[1].children.is_empty());
    }

    #[test]
    fn building_twice_gives_equal_forests() {
        let input = vec![
            msg(1, None),
            msg(2, Some(1)),
            msg(3, Some(2)),
            msg(4, Some(1)),
            msg(5, None),
        ];
        assert_eq!(build_tree(&input), build_tree(&input));
    }

    #[test]
    fn siblings_keep_input_order() {
        let forest = build_tree(&[msg(1, None), msg(5, Some(1)), msg(3, Some(1)), msg(4, Some(1))]);
        assert_eq!(ids(&forest[0].children), vec![5, 3, 4]);
    }

    #[test]
    fn nests_grandchildren() {
        let forest = build_tree(&[msg(1, None), msg(2, Some(1)), msg(3, Some(2))]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].children[0].children[0].message.mid, 3);
    }

    #[test]
    fn empty_input_gives_empty_forest() {
        assert!(build_tree(&[]).is_empty());
    }

    #[test]
    fn deep_chain_is_split_at_the_depth_limit() {
        let len = 100_000;
        let input: Vec<ThreadMessage> = (1..=len)
            .map(|mid| msg(mid, if mid == 1 { None } else { Some(mid - 1) }))
            .collect();

        let forest = build_tree(&input);
        assert_eq!(forest[0].message.mid, 1);
        assert_eq!(forest[1].message.mid, MAX_REPLY_DEPTH as i64 + 2);

        let mut seen = 0;
        let mut deepest = 0;
        let mut pending: Vec<(&MessageNode, usize)> = forest.iter().map(|n| (n, 0)).collect();
        while let Some((n, depth)) = pending.pop() {
            seen += 1;
            deepest = deepest.max(depth);
            pending.extend(n.children.iter().map(|c| (c, depth + 1)));
        }
        assert_eq!(seen, len);
        assert_eq!(deepest, MAX_REPLY_DEPTH);

        let json = serde_json::to_vec(&forest).unwrap();
        assert!(!json.is_empty());
    }

    #[test]
    fn long_chain_drops_without_recursing() {
        let mut node = MessageNode {
            message: msg(1, None),
            children: Vec::new(),
        };
        for mid in 2..=200_000 {
            node = MessageNode {
                message: msg(mid, Some(mid - 1)),
                children: vec![node],
            };
        }
        drop(node);
    }

    #[test]
    fn reply_cycle_is_cut_not_followed() {
        let forest = build_tree(&[msg(1, Some(2)), msg(2, Some(1)), msg(3, None)]);

        let mut all = Vec::new();
        let mut pending: Vec<&MessageNode> = forest.iter().collect();
        while let Some(n) = pending.pop() {
            all.push(n.message.mid);
            pending.extend(n.children.iter());
        }
        all.sort();
        assert_eq!(all, vec![1, 2, 3]);
    }

    #[test]
    fn self_reply_is_a_root() {
        let forest = build_tree(&[msg(1, Some(1))]);
        assert_eq!(ids(&forest), vec![1]);
        assert!(forest[0].children.is_empty());
    }
}

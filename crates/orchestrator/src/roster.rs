//! Shared users and their awareness colors.

use im::Vector;
use rand::{seq::SliceRandom, Rng};
use serde::Serialize;
use tracing::debug;

use crate::types::User;

/// A user of the roster and the color it was assigned on joining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub user: User,
    pub color: Option<String>,
}

/// Everyone with access to the session, in join order.
///
/// Colors are drawn from the palette in join order and cycle once it is
/// exhausted. A removed user does not give its color back.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: Vector<Member>,
    palette: Vec<String>,
    joined: usize,
}

impl Roster {
    pub fn new(palette: Vec<String>, users: impl IntoIterator<Item = User>) -> Self {
        let mut roster = Self {
            members: Vector::new(),
            palette,
            joined: 0,
        };
        for user in users {
            roster.add(user);
        }
        roster
    }

    /// Like [`Roster::new`] with the palette shuffled first.
    pub fn shuffled<R: Rng + ?Sized>(
        mut palette: Vec<String>,
        users: impl IntoIterator<Item = User>,
        rng: &mut R,
    ) -> Self {
        palette.shuffle(rng);
        Self::new(palette, users)
    }

    /// Add `user` unless a member with the same email exists.
    pub fn add(&mut self, user: User) -> bool {
        if self.members.iter().any(|member| member.user.email == user.email) {
            debug!(email = ?user.email, "User already shared");
            return false;
        }
        let color = self.next_color();
        self.members.push_back(Member { user, color });
        true
    }

    /// Remove every member with `email`; returns how many were removed.
    pub fn remove(&mut self, email: &str) -> usize {
        let before = self.members.len();
        self.members
            .retain(|member| member.user.email.as_deref() != Some(email));
        before - self.members.len()
    }

    fn next_color(&mut self) -> Option<String> {
        if self.palette.is_empty() {
            return None;
        }
        let color = self.palette[self.joined % self.palette.len()].clone();
        self.joined += 1;
        Some(color)
    }

    pub fn users(&self) -> Vec<User> {
        self.members.iter().map(|member| member.user.clone()).collect()
    }

    pub fn members(&self) -> &Vector<Member> {
        &self.members
    }

    pub fn color_of(&self, email: &str) -> Option<&str> {
        self.members
            .iter()
            .find(|member| member.user.email.as_deref() == Some(email))
            .and_then(|member| member.color.as_deref())
    }

    pub fn palette(&self) -> &[String] {
        &self.palette
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn palette() -> Vec<String> {
        vec!["red".into(), "green".into()]
    }

    #[test]
    fn test_colors_follow_join_order_and_cycle() {
        let roster = Roster::new(
            palette(),
            vec![
                User::new("A", "a@x"),
                User::new("B", "b@x"),
                User::new("C", "c@x"),
            ],
        );
        assert_eq!(roster.color_of("a@x"), Some("red"));
        assert_eq!(roster.color_of("b@x"), Some("green"));
        assert_eq!(roster.color_of("c@x"), Some("red"));
    }

    #[test]
    fn test_add_dedupes_by_email() {
        let mut roster = Roster::new(palette(), vec![User::new("A", "a@x")]);
        assert!(!roster.add(User::new("Other A", "a@x")));
        assert!(roster.add(User::new("B", "b@x")));
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_remove_by_email() {
        let mut roster = Roster::new(vec![], vec![User::new("A", "a@x"), User::new("B", "b@x")]);
        assert_eq!(roster.remove("a@x"), 1);
        assert_eq!(roster.remove("a@x"), 0);
        assert_eq!(roster.users(), vec![User::new("B", "b@x")]);
        assert_eq!(roster.color_of("b@x"), None);
    }

    #[test]
    fn test_shuffle_keeps_palette_entries() {
        let colors: Vec<String> = (0..8).map(|i| format!("#00000{i}")).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let roster = Roster::shuffled(colors.clone(), Vec::new(), &mut rng);

        let mut shuffled = roster.palette().to_vec();
        shuffled.sort();
        assert_eq!(shuffled, colors);
    }
}

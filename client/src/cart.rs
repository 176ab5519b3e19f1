//! [`Cart`] of listings the user intends to open deals for.

use service::domain::item;

use crate::catalog::{Category, Summary};

/// Listings picked by the user, at most once each.
#[derive(Clone, Debug, Default)]
pub struct Cart {
    lines: Vec<Summary>,
}

impl Cart {
    /// Creates an empty [`Cart`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the provided listing, unless it's already in this [`Cart`].
    ///
    /// Returns whether the listing was added.
    pub fn add(&mut self, summary: Summary) -> bool {
        if self.contains(summary.category, summary.id) {
            return false;
        }
        self.lines.push(summary);
        true
    }

    /// Removes the listing with the provided key.
    ///
    /// Returns whether the listing was present.
    pub fn remove(&mut self, category: Category, id: item::Id) -> bool {
        let before = self.lines.len();
        self.lines
            .retain(|l| !(l.category == category && l.id == id));
        self.lines.len() != before
    }

    /// Indicates whether the listing with the provided key is in this
    /// [`Cart`].
    #[must_use]
    pub fn contains(&self, category: Category, id: item::Id) -> bool {
        self.lines.iter().any(|l| l.category == category && l.id == id)
    }

    /// Returns the listings of this [`Cart`] in the order they were added.
    #[must_use]
    pub fn lines(&self) -> &[Summary] {
        &self.lines
    }

    /// Indicates whether this [`Cart`] is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod spec {
    use service::domain::{item, user};

    use super::Cart;
    use crate::catalog::{Category, Summary};

    fn summary(category: Category, id: item::Id) -> Summary {
        Summary {
            id,
            category,
            owner: user::Id::new(),
            title: "Tractor".into(),
            price: "9000".into(),
            image: None,
        }
    }

    #[test]
    fn keys_by_category_and_id() {
        let id = item::Id::new();
        let mut cart = Cart::new();

        assert!(cart.add(summary(Category::Machine, id)));
        assert!(!cart.add(summary(Category::Machine, id)));
        assert!(cart.add(summary(Category::Land, id)));
        assert_eq!(cart.lines().len(), 2);

        assert!(cart.remove(Category::Machine, id));
        assert!(!cart.remove(Category::Machine, id));
        assert!(cart.contains(Category::Land, id));
    }
}

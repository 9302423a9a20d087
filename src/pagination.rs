use serde::Serialize;
use utoipa::ToSchema;

/// Products shown per catalog page.
pub const CATALOG_PAGE_SIZE: i64 = 12;

#[derive(Serialize, Debug, ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Position of one page inside a result set of `count` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub per_page: i64,
}

impl PageWindow {
    /// Resolves the requested page leniently: a missing or non-numeric value
    /// gives the first page, an out of range number gives the last one.
    /// An empty result set still has a single empty page.
    pub fn resolve(requested: Option<&str>, count: i64, per_page: i64) -> Self {
        let per_page = per_page.max(1);
        let num_pages = if count <= 0 {
            1
        } else {
            (count + per_page - 1) / per_page
        };

        let number = match requested.map(str::trim).map(str::parse::<i64>) {
            Some(Ok(n)) if (1..=num_pages).contains(&n) => n,
            Some(Ok(_)) => num_pages,
            _ => 1,
        };

        Self {
            number,
            num_pages,
            count: count.max(0),
            per_page,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn into_page<T>(self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_next: self.number < self.num_pages,
            has_previous: self.number > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_garbage_page_falls_back_to_first() {
        assert_eq!(PageWindow::resolve(None, 30, 12).number, 1);
        assert_eq!(PageWindow::resolve(Some("abc"), 30, 12).number, 1);
        assert_eq!(PageWindow::resolve(Some(""), 30, 12).number, 1);
    }

    #[test]
    fn out_of_range_page_falls_back_to_last() {
        let window = PageWindow::resolve(Some("9"), 30, 12);
        assert_eq!(window.num_pages, 3);
        assert_eq!(window.number, 3);
        assert_eq!(PageWindow::resolve(Some("0"), 30, 12).number, 3);
        assert_eq!(PageWindow::resolve(Some("-2"), 30, 12).number, 3);
    }

    #[test]
    fn empty_result_has_one_empty_page() {
        let window = PageWindow::resolve(Some("5"), 0, 12);
        assert_eq!(window.number, 1);
        assert_eq!(window.num_pages, 1);

        let page = window.into_page(Vec::<i32>::new());
        assert!(!page.has_next);
        assert!(!page.has_previous);
    }

    #[test]
    fn offsets_follow_the_page_number() {
        let window = PageWindow::resolve(Some("2"), 25, 12);
        assert_eq!(window.offset(), 12);
        assert_eq!(window.limit(), 12);

        let page = window.into_page(vec![1, 2, 3]);
        assert!(page.has_next);
        assert!(page.has_previous);
        assert_eq!(page.count, 25);
    }
}

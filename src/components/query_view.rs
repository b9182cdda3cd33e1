use crate::services::QueryState;

/// Which of the three mutually exclusive page states to render
#[derive(Debug, Clone, PartialEq)]
pub enum QueryView<T> {
    Loading,
    Failed,
    Ready {
        data: T,
        /// A background refetch is running while stale data is shown
        is_fetching: bool,
    },
}

impl<T> From<QueryState<T>> for QueryView<T> {
    fn from(state: QueryState<T>) -> Self {
        if state.is_loading() {
            return QueryView::Loading;
        }

        if state.error.is_some() {
            return QueryView::Failed;
        }

        match state.data {
            Some(data) => QueryView::Ready {
                data,
                is_fetching: state.is_fetching,
            },
            None => QueryView::Loading,
        }
    }
}

impl<T> QueryView<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, QueryView::Loading)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, QueryView::Failed)
    }

    pub fn is_fetching(&self) -> bool {
        matches!(self, QueryView::Ready { is_fetching: true, .. })
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            QueryView::Ready { data, .. } => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::QueryError;

    fn state(data: Option<u32>, error: bool, is_fetching: bool) -> QueryState<u32> {
        QueryState {
            data,
            error: error.then_some(QueryError::Aborted),
            is_fetching,
            updated_at: None,
        }
    }

    #[test]
    fn test_pending_is_loading() {
        assert_eq!(QueryView::from(state(None, false, true)), QueryView::Loading);
    }

    #[test]
    fn test_error_without_data_is_failed() {
        assert_eq!(QueryView::from(state(None, true, false)), QueryView::Failed);
    }

    #[test]
    fn test_error_takes_precedence_over_stale_data() {
        assert_eq!(QueryView::from(state(Some(1), true, false)), QueryView::Failed);
    }

    #[test]
    fn test_data_with_background_fetch() {
        let view = QueryView::from(state(Some(3), false, true));
        assert!(view.is_fetching());
        assert_eq!(view.into_data(), Some(3));
    }
}

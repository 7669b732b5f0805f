use crate::dist::DistanceMetric;
use crate::error::KernelError;
use crate::query::{PointFilter, Query};
use crate::types::id::{PointId, QueryId};
use crate::types::point::DataPoint;

#[test]
fn test_zero_k_is_rejected() {
    let target = DataPoint::new(PointId(0), vec![0.0]);
    let err = Query::new(QueryId(1), 0, target, DistanceMetric::Euclidean, None).unwrap_err();
    assert_eq!(err, KernelError::InvalidK(0));
}

#[test]
fn test_filters() {
    let allow = PointFilter::allow([PointId(1), PointId(3)]);
    assert!(allow.matches(PointId(1)));
    assert!(!allow.matches(PointId(2)));

    let deny = PointFilter::deny([PointId(1)]);
    assert!(!deny.matches(PointId(1)));
    assert!(deny.matches(PointId(2)));

    let range = PointFilter::Range { start: PointId(10), end: PointId(20) };
    assert!(!range.matches(PointId(9)));
    assert!(range.matches(PointId(10)));
    assert!(range.matches(PointId(19)));
    assert!(!range.matches(PointId(20)));
}

#[test]
fn test_query_without_filter_admits_everything() {
    let target = DataPoint::new(PointId(0), vec![0.0]);
    let q = Query::new(QueryId(5), 3, target, DistanceMetric::Cosine, None).unwrap();
    assert!(q.admits(PointId(12345)));
    assert_eq!(q.k(), 3);
    assert_eq!(q.metric(), DistanceMetric::Cosine);
    assert_eq!(q.id(), QueryId(5));
}

#[test]
fn test_decoded_query_with_zero_k_is_rejected() {
    let target = DataPoint::new(PointId(0), vec![1.0, 2.0]);
    let query = Query::new(QueryId(3), 2, target, DistanceMetric::Cosine, None).unwrap();

    let mut encoded = serde_json::to_value(&query).unwrap();
    let decoded: Query = serde_json::from_value(encoded.clone()).unwrap();
    assert_eq!(decoded, query);

    encoded["k"] = serde_json::json!(0);
    let err = serde_json::from_value::<Query>(encoded).unwrap_err();
    assert!(err.to_string().contains("k=0"), "{}", err);
}

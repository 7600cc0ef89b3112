use itertools::Itertools;

/// Every combination picking one item from each list, in list order.
///
/// No lists yields no combinations, and any empty list empties the product.
pub fn cartesian_product<T: Clone>(lists: &[Vec<T>]) -> Vec<Vec<T>> {
    if lists.is_empty() {
        return Vec::new();
    }
    lists
        .iter()
        .map(|list| list.iter().cloned())
        .multi_cartesian_product()
        .collect()
}

//! Combinatorics.

/// Decodes a `permutation` index into one ordinal per dimension, where dimension `i` has
/// `cardinalities[i]` possible values. The first dimension varies fastest.
pub fn pick(cardinalities: &[usize], permutation: u64, ordinals: &mut [usize]) {
    debug_assert_eq!(cardinalities.len(), ordinals.len());
    let mut residual = permutation;
    for (index, &cardinality) in cardinalities.iter().enumerate() {
        let cardinality = cardinality as u64;
        let (quotient, remainder) = (residual / cardinality, residual % cardinality);
        residual = quotient;
        ordinals[index] = remainder as usize;
    }
}

pub fn count_permutations(cardinalities: &[usize]) -> u64 {
    cardinalities.iter().product::<usize>() as u64
}

use std::collections::HashSet;

use crate::models::InvertedIndex;

/// 候选集合 - 到目前为止满足全部索引筛选条件的记录位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSet {
    /// 尚无约束，等价于全部记录
    Unconstrained,
    /// 已被至少一个维度收窄，可能为空
    Narrowed(HashSet<usize>),
}

impl CandidateSet {
    /// 与某个维度的约束求交；`None` 表示该维度没有约束
    pub fn intersect(self, constraint: Option<HashSet<usize>>) -> Self {
        match (self, constraint) {
            (current, None) => current,
            (CandidateSet::Unconstrained, Some(set)) => CandidateSet::Narrowed(set),
            (CandidateSet::Narrowed(current), Some(set)) => {
                CandidateSet::Narrowed(intersect_sets(current, set))
            }
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        matches!(self, CandidateSet::Unconstrained)
    }

    /// 按名次表排序候选位置；无约束时返回 `None`
    pub fn ordered(&self, ranks: &[usize]) -> Option<Vec<usize>> {
        match self {
            CandidateSet::Unconstrained => None,
            CandidateSet::Narrowed(set) => {
                let mut ordered: Vec<usize> = set.iter().copied().collect();
                ordered.sort_unstable_by_key(|&pos| ranks.get(pos).copied().unwrap_or(usize::MAX));
                Some(ordered)
            }
        }
    }
}

fn intersect_sets(a: HashSet<usize>, b: HashSet<usize>) -> HashSet<usize> {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.into_iter().filter(|pos| large.contains(pos)).collect()
}

/// 合并多个取值的索引桶 (维度内"或")
///
/// 取值列表为空时返回 `None`，表示不筛选。
pub fn union_from_index(index: &InvertedIndex, values: &[String]) -> Option<HashSet<usize>> {
    if values.is_empty() {
        return None;
    }

    let mut result = HashSet::new();
    for value in values {
        if let Some(positions) = index.get(value) {
            result.extend(positions.iter().copied());
        }
    }
    Some(result)
}

/// 求多个取值索引桶的交集 (要求全部命中)
///
/// 任一取值不存在时结果为空集；取值列表为空时返回 `None`。
pub fn intersection_from_index(index: &InvertedIndex, values: &[String]) -> Option<HashSet<usize>> {
    let (first, rest) = values.split_first()?;

    let mut result: HashSet<usize> = index
        .get(first)
        .map(|positions| positions.iter().copied().collect())
        .unwrap_or_default();

    for value in rest {
        if result.is_empty() {
            break;
        }
        match index.get(value) {
            Some(positions) => {
                let bucket: HashSet<usize> = positions.iter().copied().collect();
                result.retain(|pos| bucket.contains(pos));
            }
            None => result.clear(),
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> InvertedIndex {
        let mut index = InvertedIndex::new();
        index.insert("a".into(), vec![0, 1, 3]);
        index.insert("b".into(), vec![1, 2, 3]);
        index.insert("c".into(), vec![4]);
        index
    }

    fn set(items: &[usize]) -> HashSet<usize> {
        items.iter().copied().collect()
    }

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_values_impose_nothing() {
        assert_eq!(union_from_index(&index(), &[]), None);
        assert_eq!(intersection_from_index(&index(), &[]), None);
        assert_eq!(
            CandidateSet::Unconstrained.intersect(None),
            CandidateSet::Unconstrained
        );
    }

    #[test]
    fn union_within_dimension() {
        assert_eq!(
            union_from_index(&index(), &values(&["a", "c", "missing"])),
            Some(set(&[0, 1, 3, 4]))
        );
        assert_eq!(
            union_from_index(&index(), &values(&["missing"])),
            Some(HashSet::new())
        );
    }

    #[test]
    fn intersection_requires_every_value() {
        assert_eq!(
            intersection_from_index(&index(), &values(&["a", "b"])),
            Some(set(&[1, 3]))
        );
        assert_eq!(
            intersection_from_index(&index(), &values(&["a", "missing"])),
            Some(HashSet::new())
        );
        assert_eq!(
            intersection_from_index(&index(), &values(&["a"])),
            Some(set(&[0, 1, 3]))
        );
    }

    #[test]
    fn first_constraint_replaces_unconstrained() {
        let narrowed = CandidateSet::Unconstrained.intersect(Some(set(&[2, 5])));
        assert_eq!(narrowed, CandidateSet::Narrowed(set(&[2, 5])));

        let and = narrowed.intersect(Some(set(&[5, 7])));
        assert_eq!(and, CandidateSet::Narrowed(set(&[5])));
    }

    #[test]
    fn empty_narrowing_is_not_unconstrained() {
        let empty = CandidateSet::Unconstrained
            .intersect(Some(HashSet::new()))
            .intersect(None);
        assert!(!empty.is_unconstrained());
        assert_eq!(empty.ordered(&[0, 1, 2]), Some(Vec::new()));
    }

    #[test]
    fn ordered_by_rank() {
        // 名次: 位置 0 -> 2, 1 -> 0, 2 -> 1
        let ranks = [2, 0, 1];
        let candidate = CandidateSet::Narrowed(set(&[0, 1, 2]));
        assert_eq!(candidate.ordered(&ranks), Some(vec![1, 2, 0]));
        assert_eq!(CandidateSet::Unconstrained.ordered(&ranks), None);
    }
}

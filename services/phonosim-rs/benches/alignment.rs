use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use phonosim_core::align::{segments_of, DEFAULT_GAP_PENALTY, MISSING_DISTANCE};
use phonosim_core::{
    natural_classes, segment_similarity, FeatureInventory, FeatureValue, NeedlemanWunsch,
    PairwiseDistanceBuilder, SegmentDistances, WordList,
};

const SEGMENTS: &str = "ptkbdgmnszaeiou";

/// Deterministic inventory: segment `s` carries bit `f` of a per-segment mix for feature `f`
fn inventory(num_features: usize) -> FeatureInventory {
    let segments: Vec<char> = SEGMENTS.chars().collect();
    let features = (0..num_features).map(|f| format!("f{f}")).collect();
    let rows = (0..segments.len())
        .map(|s| {
            let mix = (s as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            (0..num_features)
                .map(|f| match (mix >> (2 * f)) & 3 {
                    0 => FeatureValue::NotApplicable,
                    1 => FeatureValue::Zero,
                    _ => FeatureValue::One,
                })
                .collect()
        })
        .collect();
    FeatureInventory::new(segments, features, rows).unwrap()
}

fn lookup() -> SegmentDistances {
    let inv = inventory(8);
    let classes = natural_classes(&inv).unwrap();
    let matrix = segment_similarity(&inv, &classes);
    SegmentDistances::from_similarity_matrix(&matrix, MISSING_DISTANCE)
}

fn words(count: usize, len: usize) -> Vec<String> {
    let alphabet: Vec<char> = SEGMENTS.chars().collect();
    (0..count)
        .map(|w| {
            (0..len)
                .map(|i| alphabet[(w * 7 + i * 3 + w / alphabet.len()) % alphabet.len()])
                .collect()
        })
        .collect()
}

//==============================================================================
// NATURAL CLASSES
//==============================================================================

fn bench_natural_classes(c: &mut Criterion) {
    let mut group = c.benchmark_group("natural_classes");
    group.sample_size(20);

    for &num_features in &[6usize, 8, 10] {
        let inv = inventory(num_features);
        group.throughput(Throughput::Elements(3u64.pow(num_features as u32) - 1));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("features={}", num_features)),
            &inv,
            |b, inv| b.iter(|| black_box(natural_classes(inv).unwrap())),
        );
    }

    group.finish();
}

//==============================================================================
// ALIGNMENT
//==============================================================================

fn bench_word_pair(c: &mut Criterion) {
    let mut group = c.benchmark_group("word_pair");
    let lookup = lookup();
    let nw = NeedlemanWunsch::new(&lookup, DEFAULT_GAP_PENALTY);

    for &len in &[4usize, 8, 16] {
        let pair = words(2, len);
        let a = segments_of(&pair[0]);
        let b = segments_of(&pair[1]);

        group.bench_with_input(BenchmarkId::new("distance", len), &len, |bench, _| {
            bench.iter(|| black_box(nw.distance(black_box(&a), black_box(&b))))
        });
        group.bench_with_input(BenchmarkId::new("align", len), &len, |bench, _| {
            bench.iter(|| black_box(nw.align(black_box(&a), black_box(&b))))
        });
    }

    group.finish();
}

fn bench_pairwise_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("pairwise_table");
    group.sample_size(10);
    let lookup = lookup();
    let alphabet = lookup.segments();
    let builder = PairwiseDistanceBuilder::new(&lookup, DEFAULT_GAP_PENALTY);

    for &count in &[50usize, 200] {
        let list = WordList::new(words(count, 6), &alphabet).unwrap();
        let pairs = (list.len() * list.len().saturating_sub(1) / 2) as u64;
        group.throughput(Throughput::Elements(pairs));
        group.bench_with_input(BenchmarkId::from_parameter(count), &list, |b, list| {
            b.iter(|| black_box(builder.build(list)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_natural_classes,
    bench_word_pair,
    bench_pairwise_table
);
criterion_main!(benches);

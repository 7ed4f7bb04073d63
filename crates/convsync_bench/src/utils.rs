//! Benchmark utilities.

use convsync_testkit::TestEntity;
use rand::Rng;

/// Generate a random string property of the specified length.
pub fn random_text(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range('a'..='z')).collect()
}

/// Generate flat entities, each carrying `payload` bytes of text.
pub fn generate_entities(count: usize, payload: usize) -> Vec<TestEntity> {
    (0..count)
        .map(|i| TestEntity::new("Bench", format!("e{i}")).with_property("text", random_text(payload)))
        .collect()
}

/// Generate a random DAG: every entity gets up to `max_slaves` slaves among
/// the entities generated before it. Newest entities come first.
pub fn generate_graph(count: usize, max_slaves: usize) -> Vec<TestEntity> {
    let mut rng = rand::thread_rng();
    let mut entities: Vec<TestEntity> = Vec::with_capacity(count);
    for i in 0..count {
        let entity = TestEntity::new("Graph", format!("g{i}"));
        if i > 0 {
            for _ in 0..rng.gen_range(0..=max_slaves) {
                entity.add_slave(&entities[rng.gen_range(0..i)]);
            }
        }
        entities.push(entity);
    }
    entities.reverse();
    entities
}

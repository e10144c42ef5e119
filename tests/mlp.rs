//! End-to-end scenario: a small autoencoder with a symbolic batch size,
//! shared parameters, grouped layers, differentiation and JSON export.

use pretty_assertions::assert_eq;
use symgrad::prelude::*;
use symgrad::GraphDocument;

const DIMS: [i64; 3] = [784, 500, 300];

#[test]
fn autoencoder_with_symbolic_batch() {
    let store = SharedStore::new();
    let mut g = Graph::new("autoencoder");

    // One column per example; the batch size is a named unknown.
    let batch = g.new_symbol();
    let input = g
        .matrix(
            DataType::Float32,
            [SymInt::from(DIMS[0]), batch.clone()],
            "input",
        )
        .unwrap();

    // Encoder and mirrored decoder parameters.
    let mut params = Vec::new();
    let mut h = input;
    for i in 0..DIMS.len() - 1 {
        g.set_group(&format!("layer{}", i + 1));
        let w = store.make(
            &format!("w{}", i + 1),
            DataType::Float32,
            Shape::matrix(DIMS[i + 1], DIMS[i]),
        );
        let b = store.make(
            &format!("b{}", i + 1),
            DataType::Float32,
            Shape::vector(DIMS[i + 1]),
        );
        let w = g.shared(w).unwrap();
        let b = g.shared(b).unwrap();
        let wh = g.dot(w, h).unwrap();
        let pre = g.add(&[wh, b]).unwrap();
        h = g.tanh(pre).unwrap();
        params.push(w);
        params.push(b);
        g.pop_group();
    }
    for i in (0..DIMS.len() - 1).rev() {
        g.set_group(&format!("layer{}", DIMS.len() + 1 - i));
        let w = store.make(
            &format!("v{}", i + 1),
            DataType::Float32,
            Shape::matrix(DIMS[i], DIMS[i + 1]),
        );
        let w = g.shared(w).unwrap();
        let wh = g.dot(w, h).unwrap();
        h = g.tanh(wh).unwrap();
        params.push(w);
        g.pop_group();
    }

    // Reconstruction error.
    let diff = g.sub(h, input).unwrap();
    let sq = g.square(diff).unwrap();
    let loss = g.sum_all(sq).unwrap();
    assert!(g.node(loss).shape.is_scalar());

    let grads = g.gradient(loss, &params).unwrap();
    assert_eq!(grads.len(), params.len());
    for (&param, &grad) in params.iter().zip(&grads) {
        assert_eq!(g.node(grad).shape, g.node(param).shape);
        assert_eq!(g.node(grad).grad_level, 1);
    }

    // The batch dimension of the loss-to-input gradient is still symbolic.
    let input_grad = g.gradient(loss, &[input]).unwrap()[0];
    assert_eq!(g.node(input_grad).shape[1], batch);

    // Only the batch symbol was ever minted.
    assert_eq!(g.registry().total_symbols(), 1);
    assert_eq!(store.len(), 6);
}

#[test]
fn exported_document_covers_the_whole_graph() {
    let mut g = Graph::new("export");
    let batch = g.new_symbol();
    let input = g
        .matrix(DataType::Float32, [SymInt::from(8), batch], "input")
        .unwrap();
    g.set_group("layer1");
    let w = g
        .matrix(
            DataType::Float32,
            [SymInt::from(4), SymInt::from(8)],
            "w",
        )
        .unwrap();
    let h = g.dot(w, input).unwrap();
    g.pop_group();
    let sq = g.square(h).unwrap();
    let loss = g.sum_all(sq).unwrap();
    let _ = g.gradient(loss, &[w]).unwrap();

    let doc = GraphDocument::from_graph(&g);
    assert_eq!(doc.nodes.len(), g.len());
    assert!(doc
        .nodes
        .iter()
        .any(|n| n.op == "MatrixMul" && n.group == "layer1"));
    assert!(doc.nodes.iter().any(|n| n.group == "gradients"));
    // Every referenced input id exists and precedes its node.
    for node in &doc.nodes {
        for &input in &node.inputs {
            assert!(input < node.id);
        }
    }
}

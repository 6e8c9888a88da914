use pretty_assertions::assert_eq;

use tensorlang::graph::ParamRecord;
use tensorlang::ir::{Operand, ValueId};
use tensorlang::lower::{GraphLowering, LowerConfig, LowerError, ReturnOrder};
use tensorlang::{
    lower_graph, DType, Graph, IdAllocator, Operator, Param, Shape, Tensor, TensorBuffer,
    TensorRef,
};

fn config() -> LowerConfig {
    LowerConfig::default().with_print_locations(true)
}

fn neuron(ids: &mut IdAllocator, name: &str, dims: &[usize]) -> TensorRef {
    Tensor::new(ids, dims, DType::F32).with_name(name).into_ref()
}

fn weight(ids: &mut IdAllocator, name: &str, dims: &[usize]) -> TensorRef {
    let len = dims.iter().product::<usize>();
    let data = (0..len).map(|i| i as f32 * 0.5).collect::<Vec<_>>();
    let buffer = TensorBuffer::from_vec(dims, data).unwrap();
    Tensor::coeff(ids, buffer).with_name(name).into_ref()
}

fn relu_graph(ids: &mut IdAllocator) -> Graph {
    let x = neuron(ids, "in", &[1, 3, 4, 4]);
    let y = neuron(ids, "out", &[1, 3, 4, 4]);
    let mut graph = Graph::new("net");
    graph.set_inputs(vec![x.clone()]);
    graph.set_outputs(vec![y.clone()]);
    graph.add_operator(Operator::new("top.Relu", vec![Some(x)], vec![y]));
    graph
}

fn two_conv_graph(ids: &mut IdAllocator) -> Graph {
    let x = neuron(ids, "x", &[1, 3, 8, 8]);
    let w = weight(ids, "w", &[4, 3, 3, 3]);
    let y1 = neuron(ids, "y1", &[1, 4, 6, 6]);
    let y2 = neuron(ids, "y2", &[1, 4, 6, 6]);
    let mut graph = Graph::new("convs");
    graph.set_inputs(vec![x.clone()]);
    graph.set_outputs(vec![y1.clone(), y2.clone()]);
    for y in [y1, y2] {
        graph.add_operator(
            Operator::new("top.Conv", vec![Some(x.clone()), Some(w.clone()), None], vec![y])
                .with_param("kernel_shape", Param::i64_array([3, 3]))
                .with_param("do_relu", Param::from(false)),
        );
    }
    graph
}

#[test]
fn relu_lowers_to_one_argument_one_op_and_a_return() {
    let mut ids = IdAllocator::new();
    let graph = relu_graph(&mut ids);
    let lowered = GraphLowering::new(&graph, config()).lower().unwrap();

    let function = lowered.module.entry().unwrap();
    assert_eq!(function.arguments.len(), 1);
    assert_eq!(function.body.len(), 1);
    assert_eq!(function.returns, function.body[0].results);
    assert!(lowered.weights.is_empty());

    let expected = concat!(
        "module @net attributes {module.platform = \"TPULANG\", module.state = \"TOP_F32\", ",
        "module.weight_file = \"net_top_f32_weight.bin\"} {\n",
        "  func.func @main(%0: tensor<1x3x4x4xf32> loc(\"in\")) -> tensor<1x3x4x4xf32> {\n",
        "    %1 = \"top.Relu\"(%0) : (tensor<1x3x4x4xf32>) -> tensor<1x3x4x4xf32> ",
        "loc(fused[\"out\"])\n",
        "    return %1 : tensor<1x3x4x4xf32>\n",
        "  }\n",
        "}\n",
    );
    assert_eq!(lowered.to_text(), expected);
}

#[test]
fn shared_weight_is_materialized_once() {
    let mut ids = IdAllocator::new();
    let graph = two_conv_graph(&mut ids);
    let lowered = lower_graph(&graph).unwrap();
    let function = lowered.module.entry().unwrap();

    let weights = function.ops_named("top.Weight").collect::<Vec<_>>();
    assert_eq!(weights.len(), 1);
    let weight_value = weights[0].results[0];

    let convs = function.ops_named("top.Conv").collect::<Vec<_>>();
    assert_eq!(convs.len(), 2);
    for conv in &convs {
        assert_eq!(
            conv.operands,
            vec![
                Operand::Value(ValueId(0)),
                Operand::Value(weight_value),
                Operand::None
            ]
        );
    }

    assert_eq!(lowered.weights.len(), 1);
    assert!(lowered.weights.contains("w"));
    assert_eq!(lowered.stats.weights, 1);
    assert_eq!(lowered.stats.operations, 3);
    assert_eq!(lowered.stats.bound_tensors, 4);
}

#[test]
fn conv_text_shows_weight_none_operand_and_attributes() {
    let mut ids = IdAllocator::new();
    let graph = two_conv_graph(&mut ids);
    let text = GraphLowering::new(&graph, config()).lower().unwrap().to_text();
    assert!(
        text.contains("    %1 = \"top.Weight\"() : () -> tensor<4x3x3x3xf32> loc(\"w\")\n"),
        "{text}"
    );
    assert!(
        text.contains(
            "%2 = \"top.Conv\"(%0, %1, none) {do_relu = false, kernel_shape = [3 : i64, 3 : i64]} \
             : (tensor<1x3x8x8xf32>, tensor<4x3x3x3xf32>, none) -> tensor<1x4x6x6xf32>"
        ),
        "{text}"
    );
    assert!(text.contains("%3 = \"top.Conv\"(%0, %1, none)"), "{text}");
    assert!(text.contains("return %2, %3 : tensor<1x4x6x6xf32>, tensor<1x4x6x6xf32>"));
}

#[test]
fn unused_constants_are_never_emitted() {
    let mut ids = IdAllocator::new();
    let graph = relu_graph(&mut ids);
    let _unused = weight(&mut ids, "unused", &[2]);

    let lowered = lower_graph(&graph).unwrap();
    assert!(lowered.weights.is_empty());
    assert_eq!(lowered.module.entry().unwrap().ops_named("top.Weight").count(), 0);
}

#[test]
fn shape_mismatch_is_ambiguous() {
    let mut ids = IdAllocator::new();
    let x = neuron(&mut ids, "x", &[2, 3]);
    let buffer = TensorBuffer::from_vec([3, 2], vec![1.0f32; 6]).unwrap();
    let w = Tensor::new(&mut ids, [2, 3], DType::F32)
        .with_name("w")
        .with_buffer(buffer)
        .unwrap()
        .into_ref();
    let y = neuron(&mut ids, "y", &[2, 3]);
    let mut graph = Graph::new("bad");
    graph.set_inputs(vec![x.clone()]);
    graph.set_outputs(vec![y.clone()]);
    graph.add_operator(Operator::new("top.Add", vec![Some(x), Some(w)], vec![y]));

    let err = lower_graph(&graph).unwrap_err();
    assert!(
        matches!(&err, LowerError::ShapeAmbiguous { tensor, declared, buffer }
            if tensor == "w" && declared == "[2, 3]" && buffer == &vec![3, 2]),
        "{err}"
    );
    assert!(err.to_string().starts_with("Tensor shape is ambiguous!"));
}

#[test]
fn unproduced_activation_is_not_constant() {
    let mut ids = IdAllocator::new();
    let x = neuron(&mut ids, "x", &[4]);
    let orphan = neuron(&mut ids, "orphan", &[4]);
    let y = neuron(&mut ids, "y", &[4]);
    let mut graph = Graph::new("bad");
    graph.set_inputs(vec![x.clone()]);
    graph.set_outputs(vec![y.clone()]);
    graph.add_operator(Operator::new("top.Add", vec![Some(x), Some(orphan)], vec![y]));

    let err = lower_graph(&graph).unwrap_err();
    assert_eq!(err.to_string(), "Tensor 'orphan' is not constant!");
}

#[test]
fn lowering_is_deterministic() {
    let build = || {
        let mut ids = IdAllocator::with_seed(100);
        let graph = two_conv_graph(&mut ids);
        GraphLowering::new(&graph, config()).lower().unwrap()
    };
    let first = build();
    let second = build();
    assert_eq!(first.to_text(), second.to_text());

    let mut first_blob = Vec::new();
    let mut second_blob = Vec::new();
    first.weights.write_to(&mut first_blob).unwrap();
    second.weights.write_to(&mut second_blob).unwrap();
    assert_eq!(first_blob, second_blob);
}

fn chain_graph(ids: &mut IdAllocator) -> Graph {
    let x = neuron(ids, "x", &[2]);
    let first = neuron(ids, "first", &[2]);
    let second = neuron(ids, "second", &[2]);
    let mut graph = Graph::new("chain");
    graph.set_inputs(vec![x.clone()]);
    graph.set_outputs(vec![second.clone(), first.clone()]);
    graph.add_operator(Operator::new("top.Abs", vec![Some(x)], vec![first.clone()]));
    graph.add_operator(Operator::new("top.Exp", vec![Some(first)], vec![second]));
    graph
}

#[test]
fn declared_order_drives_the_return() {
    let mut ids = IdAllocator::new();
    let graph = chain_graph(&mut ids);
    let lowered = lower_graph(&graph).unwrap();
    let function = lowered.module.entry().unwrap();
    assert_eq!(function.returns, vec![ValueId(2), ValueId(1)]);
}

#[test]
fn emission_order_is_available_on_request() {
    let mut ids = IdAllocator::new();
    let graph = chain_graph(&mut ids);
    let config = config().with_return_order(ReturnOrder::Emission);
    let lowered = GraphLowering::new(&graph, config).lower().unwrap();
    let function = lowered.module.entry().unwrap();
    assert_eq!(function.returns, vec![ValueId(1), ValueId(2)]);
}

#[test]
fn constant_outputs_are_materialized_for_the_return() {
    let mut ids = IdAllocator::new();
    let x = neuron(&mut ids, "x", &[2]);
    let y = neuron(&mut ids, "y", &[2]);
    let table = weight(&mut ids, "table", &[2]);
    let mut graph = Graph::new("consts");
    graph.set_inputs(vec![x.clone()]);
    graph.set_outputs(vec![y.clone(), table]);
    graph.add_operator(Operator::new("top.Abs", vec![Some(x)], vec![y]));

    let lowered = lower_graph(&graph).unwrap();
    let function = lowered.module.entry().unwrap();
    assert_eq!(function.body.len(), 2);
    assert_eq!(function.body[1].name, "top.Weight");
    assert_eq!(function.returns, vec![ValueId(1), ValueId(2)]);
    assert!(lowered.weights.contains("table"));
}

#[test]
fn absent_outputs_lower_to_none_results() {
    let mut ids = IdAllocator::new();
    let x = neuron(&mut ids, "x", &[4, 2]);
    let values = neuron(&mut ids, "values", &[4, 1]);
    let indices = Tensor::new(&mut ids, Shape::Absent, DType::I32)
        .with_name("indices")
        .into_ref();
    let mut graph = Graph::new("topk");
    graph.set_inputs(vec![x.clone()]);
    graph.set_outputs(vec![values.clone()]);
    graph.add_operator(
        Operator::new("top.TopK", vec![Some(x)], vec![values, indices])
            .with_param("K", Param::i64(1)),
    );

    let text = GraphLowering::new(&graph, config()).lower().unwrap().to_text();
    assert!(
        text.contains(
            "%1, %2 = \"top.TopK\"(%0) {K = 1 : i64} : (tensor<4x2xf32>) -> \
             (tensor<4x1xf32>, none) loc(fused[\"values\", \"indices\"])"
        ),
        "{text}"
    );
}

#[test]
fn dict_array_params_become_dictionary_attributes() {
    let mut ids = IdAllocator::new();
    let x = neuron(&mut ids, "x", &[1]);
    let y = neuron(&mut ids, "y", &[1]);
    let mut record = ParamRecord::new();
    record.insert("alpha".to_string(), Param::f32(0.25));
    record.insert("name".to_string(), Param::from("swish"));
    let mut graph = Graph::new("custom");
    graph.set_inputs(vec![x.clone()]);
    graph.set_outputs(vec![y.clone()]);
    graph.add_operator(
        Operator::new("top.Custom", vec![Some(x)], vec![y])
            .with_param("params", Param::DictArray(vec![record])),
    );

    let text = GraphLowering::new(&graph, config()).lower().unwrap().to_text();
    assert!(
        text.contains(r#"{params = [{alpha = 0.25 : f32, name = "swish"}]}"#),
        "{text}"
    );
}

#[test]
fn locations_follow_the_config() {
    let mut ids = IdAllocator::new();
    let graph = relu_graph(&mut ids);
    let config = LowerConfig::default().with_print_locations(false);
    let text = GraphLowering::new(&graph, config).lower().unwrap().to_text();
    assert!(!text.contains("loc("), "{text}");
}

#[test]
fn distinct_constants_cannot_share_a_name() {
    let mut ids = IdAllocator::new();
    let x = neuron(&mut ids, "x", &[2]);
    let first = weight(&mut ids, "bias", &[2]);
    let second = weight(&mut ids, "bias", &[2]);
    let y = neuron(&mut ids, "y", &[2]);
    let z = neuron(&mut ids, "z", &[2]);
    let mut graph = Graph::new("dup");
    graph.set_inputs(vec![x.clone()]);
    graph.set_outputs(vec![z.clone()]);
    graph.add_operator(Operator::new("top.Add", vec![Some(x), Some(first)], vec![y.clone()]));
    graph.add_operator(Operator::new("top.Add", vec![Some(y), Some(second)], vec![z]));

    let err = lower_graph(&graph).unwrap_err();
    assert!(
        matches!(&err, LowerError::DuplicateWeight { name } if name == "bias"),
        "{err}"
    );
}

#[test]
fn constant_and_activation_with_one_name_stay_distinct() {
    let mut ids = IdAllocator::new();
    let x = neuron(&mut ids, "x", &[2]);
    let activation = neuron(&mut ids, "shared", &[2]);
    let constant = weight(&mut ids, "shared", &[2]);
    let out = neuron(&mut ids, "out", &[2]);
    let mut graph = Graph::new("names");
    graph.set_inputs(vec![x.clone()]);
    graph.set_outputs(vec![out.clone()]);
    graph.add_operator(Operator::new("top.Abs", vec![Some(x)], vec![activation.clone()]));
    graph.add_operator(Operator::new(
        "top.Add",
        vec![Some(activation), Some(constant)],
        vec![out],
    ));

    let lowered = lower_graph(&graph).unwrap();
    let function = lowered.module.entry().unwrap();
    let abs = function.ops_named("top.Abs").next().unwrap();
    let weight_op = function.ops_named("top.Weight").next().unwrap();
    let add = function.ops_named("top.Add").next().unwrap();
    assert_eq!(
        add.operands,
        vec![
            Operand::Value(abs.results[0]),
            Operand::Value(weight_op.results[0])
        ]
    );
    assert_ne!(abs.results[0], weight_op.results[0]);
    assert_eq!(lowered.stats.bound_tensors, 4);
    assert_eq!(lowered.weights.len(), 1);
    assert!(lowered.weights.contains("shared"));
}

#[test]
fn float_parameters_print_as_mlir_literals() {
    let mut ids = IdAllocator::new();
    let x = neuron(&mut ids, "x", &[1, 8]);
    let y = neuron(&mut ids, "y", &[1, 8]);
    let mut graph = Graph::new("norm");
    graph.set_inputs(vec![x.clone()]);
    graph.set_outputs(vec![y.clone()]);
    graph.add_operator(
        Operator::new("top.LayerNorm", vec![Some(x), None, None], vec![y])
            .with_param("eps", Param::f64(1e-5))
            .with_param("big", Param::f64(1e20)),
    );

    let text = lower_graph(&graph).unwrap().to_text();
    assert!(
        text.contains("{big = 1.0e20 : f64, eps = 1.0e-5 : f64}"),
        "{text}"
    );
}

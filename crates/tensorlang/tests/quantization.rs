use tensorlang::ir::{QuantizedType, StorageType, TensorType};
use tensorlang::lower::{quantized_type, GraphLowering, LowerConfig, LowerMode};
use tensorlang::tensor::QuantParam;
use tensorlang::{DType, Graph, IdAllocator, Operator, Tensor, TensorBuffer, TensorRef};

fn quantized_graph(ids: &mut IdAllocator) -> (Graph, TensorRef) {
    let x = Tensor::new(ids, [1, 2], DType::I8)
        .with_name("x")
        .with_quantization(
            Some(QuantParam::PerTensor(0.5)),
            Some(QuantParam::PerTensor(3)),
        )
        .unwrap()
        .into_ref();
    let buffer = TensorBuffer::from_vec([4, 2], vec![1i8, -1, 2, -2, 3, -3, 4, -4]).unwrap();
    let w = Tensor::coeff(ids, buffer)
        .with_name("fc.weight")
        .with_quantization(Some(QuantParam::PerAxis(vec![0.1, 0.2])), None)
        .unwrap()
        .into_ref();
    let y = Tensor::new(ids, [1, 4], DType::I32)
        .with_name("y")
        .with_quantization(Some(QuantParam::PerTensor(0.05)), None)
        .unwrap()
        .into_ref();
    let mut graph = Graph::new("qnet");
    graph.set_inputs(vec![x.clone()]);
    graph.set_outputs(vec![y.clone()]);
    graph.add_operator(Operator::new(
        "top.MatMul",
        vec![Some(x), Some(w.clone()), None],
        vec![y],
    ));
    (graph, w)
}

#[test]
fn per_tensor_parameters_survive_the_text_form() {
    let mut ids = IdAllocator::new();
    let (graph, _) = quantized_graph(&mut ids);
    let config = LowerConfig::default().with_mode(LowerMode::Quantized);
    let lowered = GraphLowering::new(&graph, config).lower().unwrap();
    let function = lowered.module.entry().unwrap();

    let Some(StorageType::Quantized(ty)) = function.arguments[0].ty.element() else {
        panic!("input should carry a quantized type");
    };
    assert_eq!(ty.to_string(), "!quant.uniform<i8:f32, 0.5:3>");

    let parsed = ty.to_string().parse::<QuantizedType>().unwrap();
    let QuantizedType::PerTensor(parsed) = parsed else {
        panic!("expected a per-tensor type");
    };
    assert_eq!(parsed.scale, 0.5);
    assert_eq!(parsed.zero_point, 3);
    assert_eq!((parsed.storage_min, parsed.storage_max), (-128, 127));
}

#[test]
fn per_axis_weight_broadcasts_zero_points() {
    let mut ids = IdAllocator::new();
    let (graph, w) = quantized_graph(&mut ids);

    let QuantizedType::PerAxis(ty) = quantized_type(&w).unwrap() else {
        panic!("expected a per-axis type");
    };
    assert_eq!(ty.zero_points, vec![0, 0]);
    assert_eq!(ty.axis, 1);

    let lowered = GraphLowering::new(&graph, LowerConfig::default()).lower().unwrap();
    let function = lowered.module.entry().unwrap();
    let weight = function.ops_named("top.Weight").next().unwrap();
    assert_eq!(
        weight.result_types[0].to_string(),
        "tensor<4x2x!quant.uniform<i8:f32:1, {0.1,0.2}>>"
    );
}

#[test]
fn quantized_mode_is_recorded_on_the_module() {
    let mut ids = IdAllocator::new();
    let (graph, _) = quantized_graph(&mut ids);
    let config = LowerConfig::default().with_mode(LowerMode::Quantized);
    let lowered = GraphLowering::new(&graph, config).lower().unwrap();
    let text = lowered.module.to_text();
    assert!(text.contains("module.state = \"TOP_QUANTIZED\""), "{text}");
    assert!(
        text.contains("module.weight_file = \"qnet_top_quantized_weight.bin\""),
        "{text}"
    );
    assert!(
        text.contains("-> tensor<1x4x!quant.uniform<i32:f32, 0.05>>"),
        "{text}"
    );
}

#[test]
fn unsigned_storage_uses_the_unsigned_range() {
    let mut ids = IdAllocator::new();
    let tensor = Tensor::new(&mut ids, [3], DType::U16)
        .with_quantization(Some(QuantParam::PerTensor(2.0)), None)
        .unwrap();
    let ty = quantized_type(&tensor).unwrap();
    assert!(!ty.is_signed());
    assert_eq!(ty.storage_range(), (0, 65_535));
    assert_eq!(ty.to_string(), "!quant.uniform<u16:f32, 2.0>");
    assert!(matches!(
        tensorlang::lower::tensor_type(&tensor).unwrap(),
        TensorType::Ranked { .. }
    ));
}

//! 混合索引的端到端行为：坐标 / 列名 / 位置选择的等价性、轴的去留、
//! 描述符随数据裁剪、视图与拷贝的区别。

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use metaarray::{
    AxisDescriptor, ColumnDescriptor, ColumnName, Extra, ListItem, MetaArray, MetaError, Selector,
    SliceSpec,
};
use ndarray::{ArrayD, IxDyn};

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// 4 轴测试数组，元素值编码了它的下标：(i+1)*1000 + (j+1)*100 + (k+1)*10 + (w+1)
fn sample() -> MetaArray<f64> {
    let data = ArrayD::from_shape_fn(IxDyn(&[2, 5, 3, 5]), |ix| {
        ((ix[0] + 1) * 1000 + (ix[1] + 1) * 100 + (ix[2] + 1) * 10 + (ix[3] + 1)) as f64
    });
    let axes = vec![
        AxisDescriptor::named("Axis1"),
        AxisDescriptor::named("Axis2").with_values(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
        AxisDescriptor::named("Axis3").with_cols(vec![
            ColumnDescriptor::new("Ax3Col1"),
            ColumnDescriptor::new("Ax3Col2").with_units("mV"),
            ColumnDescriptor::new(("Ax3", "Col3")).with_units("A"),
        ]),
        AxisDescriptor::named("Axis4")
            .with_values(vec![1.1, 1.2, 1.3, 1.4, 1.5])
            .with_units("s"),
    ];
    let mut info = Extra::new();
    info.insert("info".into(), "extra info".into());
    MetaArray::new(data, axes).unwrap().with_info(info)
}

fn names(ma: &MetaArray<f64>) -> Vec<Option<String>> {
    ma.axes().iter().map(|a| a.name.clone()).collect()
}

#[test]
fn value_lookup_matches_positional_index() -> TestResult {
    let ma = sample();
    let by_value = ma.select(&[Selector::named("Axis2", 3.0)])?;
    let by_pos   = ma.select(&[Selector::all(), Selector::Index(2)])?;

    assert_eq!(by_value, by_pos);
    assert_eq!(by_value.shape(), vec![2, 3, 5]);
    assert_eq!(names(&by_value), vec![
        Some("Axis1".into()), Some("Axis3".into()), Some("Axis4".into()),
    ]);
    assert_eq!(by_value.view()[[1, 0, 4]], 2315.0);
    Ok(())
}

#[test]
fn column_lookup_drops_the_axis() -> TestResult {
    let ma = sample();
    let by_name = ma.select(&[Selector::named("Axis3", "Ax3Col2")])?;
    let by_pos  = ma.select(&[Selector::all(), Selector::all(), Selector::Index(1)])?;

    assert_eq!(by_name, by_pos);
    assert_eq!(by_name.shape(), vec![2, 5, 5]);
    assert!(by_name.axis_index("Axis3").unwrap_err().is_lookup());
    assert_eq!(by_name.view()[[0, 0, 0]], 1121.0);

    let compound = ma.select(&[Selector::named("Axis3", ColumnName::from(("Ax3", "Col3")))])?;
    assert_eq!(compound.view()[[1, 4, 4]], 2535.0);
    Ok(())
}

#[test]
fn positional_then_named_column_list() -> TestResult {
    // [0, 'Axis3':['Ax3Col1', ('Ax3','Col3')]]
    let ma = sample();
    let sel = ma.select(&[
        Selector::Index(0),
        Selector::named("Axis3", Selector::List(vec![
            ListItem::from("Ax3Col1"),
            ListItem::from(ColumnName::from(("Ax3", "Col3"))),
        ])),
    ])?;

    assert_eq!(sel.shape(), vec![5, 2, 5]);
    assert_eq!(sel.column_names(1)?, vec![
        ColumnName::from("Ax3Col1"),
        ColumnName::from(("Ax3", "Col3")),
    ]);
    assert_eq!(sel.column_units(1, &ColumnName::from(("Ax3", "Col3")))?, Some("A"));
    assert_eq!(sel.view()[[2, 1, 3]], 1334.0);
    assert!(!sel.shares_buffer_with(&ma));
    Ok(())
}

#[test]
fn value_ranges_trim_coordinates() -> TestResult {
    // ['Axis4':1.15:1.45, 'Axis2':2.0:]
    let ma = sample();
    let sel = ma.select(&[
        Selector::named("Axis4", Selector::value_range(1.15, 1.45)),
        Selector::named("Axis2", Selector::ValueRange { start: Some(2.0), stop: None }),
    ])?;

    assert_eq!(sel.shape(), vec![2, 4, 3, 3]);
    assert_eq!(sel.axis_values(1)?, Some(&[2.0, 3.0, 4.0, 5.0][..]));
    assert_eq!(sel.axis_values(3)?, Some(&[1.2, 1.3, 1.4][..]));
    assert_eq!(sel.axis_units(3)?, Some("s"));
    assert_eq!(sel.view()[[0, 0, 0, 0]], 1212.0);
    assert!(sel.shares_buffer_with(&ma));
    Ok(())
}

#[test]
fn masks_and_negative_steps() -> TestResult {
    let ma = sample();
    let masked = ma.select(&[
        Selector::all(),
        Selector::Mask(vec![true, false, true, false, true]),
    ])?;
    assert_eq!(masked.axis_values(1)?, Some(&[1.0, 3.0, 5.0][..]));
    assert_eq!(masked.view()[[0, 2, 0, 0]], 1511.0);

    let reversed = ma.select(&[
        Selector::all(),
        Selector::Slice(SliceSpec::full().with_step(-1)),
    ])?;
    assert_eq!(reversed.axis_values(1)?, Some(&[5.0, 4.0, 3.0, 2.0, 1.0][..]));
    assert_eq!(reversed.view()[[0, 0, 0, 0]], 1511.0);
    assert!(reversed.shares_buffer_with(&ma));

    let err = ma.select(&[Selector::all(), Selector::Mask(vec![true; 4])]).unwrap_err();
    assert!(matches!(err, MetaError::MaskLength { axis: 1, expected: 5, actual: 4 }));
    Ok(())
}

#[test]
fn out_of_range_slice_is_empty_not_an_error() -> TestResult {
    let ma = sample();
    let empty = ma.select(&[Selector::all(), Selector::slice(10isize..20)])?;
    assert_eq!(empty.shape(), vec![2, 0, 3, 5]);
    assert_eq!(empty.axis_values(1)?, Some(&[][..]));

    let none = ma.select(&[Selector::named("Axis4", Selector::value_range(9.0, 10.0))])?;
    assert_eq!(none.shape(), vec![2, 5, 3, 0]);
    Ok(())
}

#[test]
fn lookup_and_index_errors() {
    let ma = sample();

    let err = ma.select(&[Selector::named("Nope", 0isize)]).unwrap_err();
    assert!(matches!(err, MetaError::NameNotFound(ref n) if n == "Nope"));

    let err = ma.select(&[Selector::named("Axis3", "Missing")]).unwrap_err();
    assert!(matches!(err, MetaError::ColumnNotFound { axis: 2, .. }));

    let err = ma.select(&[Selector::named("Axis2", 2.5)]).unwrap_err();
    assert!(err.is_lookup());

    let err = ma.select(&[Selector::Index(2)]).unwrap_err();
    assert!(matches!(err, MetaError::IndexOutOfBounds { axis: 0, index: 2, len: 2 }));

    let too_many = vec![Selector::Index(0); 5];
    assert!(matches!(ma.select(&too_many), Err(MetaError::TooManyIndices { given: 5, free: 4 })));

    // 位置轴上按坐标查找
    assert!(ma.select(&[Selector::Value(1.0)]).unwrap_err().is_index());
}

#[test]
fn selection_keeps_info_and_extra() -> TestResult {
    let data = ArrayD::<i32>::zeros(IxDyn(&[3, 2]));
    let ma = MetaArray::new(data, vec![
        AxisDescriptor::named("t").with_values(vec![0.0, 0.5, 1.0]).with_extra("clock", "daq"),
        AxisDescriptor::new().with_title("channels"),
    ])?;

    let sel = ma.select(&[Selector::slice(1isize..)])?;
    assert_eq!(sel.axes()[0].extra.get("clock"), Some(&serde_json::Value::from("daq")));
    assert_eq!(sel.axes()[1].title.as_deref(), Some("channels"));
    assert_eq!(sel.info(), ma.info());
    Ok(())
}

#[test]
fn sliced_results_share_until_written() -> TestResult {
    let ma = sample();
    let row = ma.select(&[Selector::Index(1)])?;
    assert!(row.shares_buffer_with(&ma));

    let mut edited = row.clone();
    edited.data_mut()?[[0, 0, 0]] = -1.0;
    assert_eq!(edited.view()[[0, 0, 0]], -1.0);
    assert_eq!(ma.view()[[1, 0, 0, 0]], 2111.0);
    assert_eq!(row.view()[[0, 0, 0]], 2111.0);
    Ok(())
}

#[test]
fn arithmetic_keeps_descriptors() -> TestResult {
    let ma = sample();
    let shifted = &(&ma - 1000.0) * 2.0;
    assert_eq!(shifted.axes(), ma.axes());
    assert_eq!(shifted.view()[[0, 0, 0, 0]], 222.0);

    let col = ma.select(&[Selector::named("Axis3", "Ax3Col1")])?;
    let diff = col.zip_with(&col, |a, b| a - b)?;
    assert!(diff.view().iter().all(|&v| v == 0.0));
    assert_eq!(ma.gt(2000.0).iter().filter(|&&b| b).count(), 75);
    Ok(())
}
